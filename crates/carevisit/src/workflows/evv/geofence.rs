use serde::{Deserialize, Serialize};

use crate::geo::{self, GeoPoint, ReportedLocation};

/// Outcome of comparing a GPS fix against a patient's registered residence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceVerification {
    pub is_within_geofence: bool,
    /// Whole meters between the fix and the home.
    pub distance_from_home: u32,
    pub geofence_radius: u32,
}

impl GeofenceVerification {
    /// Measure `location` against `home`. Membership is decided on the rounded distance so the
    /// stored figures always agree with the verdict.
    pub fn measure(home: GeoPoint, location: &ReportedLocation, radius_meters: u32) -> Self {
        let meters = geo::distance_meters(home, location.point()).round();
        let distance_from_home = if meters >= u32::MAX as f64 {
            u32::MAX
        } else {
            meters as u32
        };

        Self {
            is_within_geofence: distance_from_home <= radius_meters,
            distance_from_home,
            geofence_radius: radius_meters,
        }
    }

    pub fn note(&self) -> String {
        if self.is_within_geofence {
            format!(
                "Location verified: {}m from patient home (geofence {}m)",
                self.distance_from_home, self.geofence_radius
            )
        } else {
            format!(
                "Location outside geofence: {}m from patient home (geofence {}m)",
                self.distance_from_home, self.geofence_radius
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: GeoPoint = GeoPoint::new(40.0, -75.0);

    #[test]
    fn fix_at_the_home_is_zero_meters_and_inside() {
        let verification = GeofenceVerification::measure(HOME, &HOME.into(), 100);
        assert_eq!(verification.distance_from_home, 0);
        assert!(verification.is_within_geofence);
    }

    #[test]
    fn fix_five_hundred_meters_away_is_outside() {
        // 0.0045 degrees of latitude is roughly 500 meters.
        let location = ReportedLocation {
            latitude: 40.0045,
            longitude: -75.0,
            accuracy: Some(5.0),
        };
        let verification = GeofenceVerification::measure(HOME, &location, 100);
        assert!(!verification.is_within_geofence);
        assert!((495..=505).contains(&verification.distance_from_home));
        assert!(verification.note().contains("outside geofence"));
    }

    #[test]
    fn verdict_always_agrees_with_rounded_distance() {
        for step in 0..40 {
            let location = ReportedLocation {
                latitude: 40.0 + step as f64 * 0.0001,
                longitude: -75.0,
                accuracy: None,
            };
            let verification = GeofenceVerification::measure(HOME, &location, 150);
            assert_eq!(
                verification.is_within_geofence,
                verification.distance_from_home <= verification.geofence_radius
            );
        }
    }
}
