use serde::{Deserialize, Serialize};

pub const DEFAULT_GEOFENCE_RADIUS_METERS: u32 = 100;
pub const DEFAULT_TIMING_TOLERANCE_MINUTES: i64 = 30;
pub const DEFAULT_DURATION_TOLERANCE_MINUTES: i64 = 30;

/// Tolerances applied by the geofence check and compliance reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvvConfig {
    /// Used for homes without their own radius.
    pub default_geofence_radius_meters: u32,
    pub timing_tolerance_minutes: i64,
    pub duration_tolerance_minutes: i64,
}

impl Default for EvvConfig {
    fn default() -> Self {
        Self {
            default_geofence_radius_meters: DEFAULT_GEOFENCE_RADIUS_METERS,
            timing_tolerance_minutes: DEFAULT_TIMING_TOLERANCE_MINUTES,
            duration_tolerance_minutes: DEFAULT_DURATION_TOLERANCE_MINUTES,
        }
    }
}
