use serde::{Deserialize, Serialize};

use super::matching::MatchingConfig;

pub const DEFAULT_ROUTE_SPEED_MPH: f64 = 30.0;
pub const DEFAULT_ETA_SPEED_MPH: f64 = 25.0;
pub const DEFAULT_MILEAGE_RATE_PER_MILE: f64 = 0.655;

/// Knobs shared by matching, routing and mileage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub matching: MatchingConfig,
    /// Blended average used when totalling a whole day's driving.
    pub route_average_speed_mph: f64,
    /// Residential-road average used for a single hop to the next visit.
    pub eta_average_speed_mph: f64,
    pub mileage_rate_per_mile: f64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            route_average_speed_mph: DEFAULT_ROUTE_SPEED_MPH,
            eta_average_speed_mph: DEFAULT_ETA_SPEED_MPH,
            mileage_rate_per_mile: DEFAULT_MILEAGE_RATE_PER_MILE,
        }
    }
}
