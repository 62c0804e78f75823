//! Great-circle distance and travel-time estimation.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
pub const EARTH_RADIUS_MILES: f64 = 3_959.0;

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// GPS fix reported by a caregiver device. `accuracy` is the device-reported radius in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl ReportedLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl From<GeoPoint> for ReportedLocation {
    fn from(point: GeoPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy: None,
        }
    }
}

/// Central angle between two points, in radians.
fn central_angle(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    // Floating error can push `h` marginally past 1.0 for antipodal points.
    2.0 * h.clamp(0.0, 1.0).sqrt().asin()
}

pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    EARTH_RADIUS_METERS * central_angle(a, b)
}

pub fn distance_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    EARTH_RADIUS_MILES * central_angle(a, b)
}

/// Minutes needed to cover `distance_miles` at a constant average speed.
pub fn estimated_travel_minutes(distance_miles: f64, avg_speed_mph: f64) -> u32 {
    if !(avg_speed_mph.is_finite() && avg_speed_mph > 0.0) || !distance_miles.is_finite() {
        return 0;
    }

    (distance_miles.max(0.0) / avg_speed_mph * 60.0).round() as u32
}

/// Round to two decimal places, used for mileage figures shown to schedulers.
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
