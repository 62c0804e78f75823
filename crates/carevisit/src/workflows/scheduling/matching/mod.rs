mod config;
mod rules;

pub use config::MatchingConfig;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::availability::AvailabilityCalculator;
use crate::geo::{self, GeoPoint};
use crate::workflows::visits::domain::{
    wall_clock, Caregiver, CaregiverId, Visit, VisitType, WeeklyAvailabilitySlot,
};

/// Visit request a caregiver is ranked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub patient_location: GeoPoint,
    pub visit_type: VisitType,
    #[serde(default)]
    pub required_specialties: Option<BTreeSet<String>>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    pub date: NaiveDate,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFactor {
    Distance,
    Specialty,
    Language,
}

/// Discrete contribution to a match score, kept for scheduler audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: MatchFactor,
    pub points: f64,
    pub notes: String,
}

/// Ranked candidate returned by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaregiverMatch {
    pub caregiver_id: CaregiverId,
    pub caregiver_name: String,
    pub score: f64,
    pub distance_miles: f64,
    #[serde(with = "wall_clock::list")]
    pub available_slots: Vec<NaiveTime>,
    pub matched_specialties: Vec<String>,
    pub speaks_preferred_language: bool,
    pub components: Vec<ScoreComponent>,
}

/// Why a caregiver was filtered out before scoring.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchRejection {
    NotActive,
    MissingHomeLocation,
    OutsideServiceRadius { distance_miles: f64, radius_miles: f64 },
    DailyCapReached { booked: usize, cap: u32 },
    NoOpenSlots,
}

impl MatchRejection {
    pub fn summary(&self) -> String {
        match self {
            MatchRejection::NotActive => "caregiver is not active".to_string(),
            MatchRejection::MissingHomeLocation => "caregiver has no home location".to_string(),
            MatchRejection::OutsideServiceRadius {
                distance_miles,
                radius_miles,
            } => format!(
                "patient is {distance_miles:.2} mi away, beyond the {radius_miles:.1} mi radius"
            ),
            MatchRejection::DailyCapReached { booked, cap } => {
                format!("{booked} visits already booked against a daily cap of {cap}")
            }
            MatchRejection::NoOpenSlots => "no open slot fits the requested duration".to_string(),
        }
    }
}

/// Stateless evaluator applying the matching weights to one caregiver at a time.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    config: MatchingConfig,
    calculator: AvailabilityCalculator,
}

impl MatchingEngine {
    pub fn new(config: MatchingConfig) -> Self {
        let calculator = AvailabilityCalculator::new(config.slot_increment_minutes);
        Self { config, calculator }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn calculator(&self) -> &AvailabilityCalculator {
        &self.calculator
    }

    /// Apply the hard filters, then score a surviving caregiver.
    ///
    /// `visits_on_date` are the caregiver's visits on the requested date, and `window` is the
    /// weekly schedule row for that weekday.
    pub fn evaluate(
        &self,
        request: &MatchRequest,
        caregiver: &Caregiver,
        visits_on_date: &[Visit],
        window: Option<&WeeklyAvailabilitySlot>,
    ) -> Result<CaregiverMatch, MatchRejection> {
        if !caregiver.is_active() {
            return Err(MatchRejection::NotActive);
        }
        let home = caregiver
            .home_location
            .ok_or(MatchRejection::MissingHomeLocation)?;

        let distance_miles = geo::distance_miles(home, request.patient_location);
        if distance_miles > caregiver.service_radius_miles {
            return Err(MatchRejection::OutsideServiceRadius {
                distance_miles,
                radius_miles: caregiver.service_radius_miles,
            });
        }

        let booked = visits_on_date
            .iter()
            .filter(|visit| visit.status.is_planned())
            .count();
        if booked >= caregiver.max_daily_visits as usize {
            return Err(MatchRejection::DailyCapReached {
                booked,
                cap: caregiver.max_daily_visits,
            });
        }

        let available_slots =
            self.calculator
                .open_slots(window, visits_on_date, request.duration_minutes);
        if available_slots.is_empty() {
            return Err(MatchRejection::NoOpenSlots);
        }

        let (components, score, signals) =
            rules::score_candidate(request, caregiver, distance_miles, &self.config);

        Ok(CaregiverMatch {
            caregiver_id: caregiver.id.clone(),
            caregiver_name: caregiver.name.clone(),
            score,
            distance_miles: geo::round_to_hundredths(distance_miles),
            available_slots,
            matched_specialties: signals.matched_specialties,
            speaks_preferred_language: signals.speaks_preferred_language,
            components,
        })
    }

    /// Order survivors best first; ties go to the closer caregiver, then to the lower id.
    pub fn rank(mut matches: Vec<CaregiverMatch>) -> Vec<CaregiverMatch> {
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.distance_miles
                        .partial_cmp(&b.distance_miles)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.caregiver_id.cmp(&b.caregiver_id))
        });
        matches
    }
}
