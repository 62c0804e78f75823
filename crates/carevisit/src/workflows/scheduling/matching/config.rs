use serde::{Deserialize, Serialize};

use super::super::availability::DEFAULT_SLOT_INCREMENT_MINUTES;

/// Weights for ranking caregivers against a visit request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub base_score: f64,
    /// Points removed at the edge of the service radius, scaled linearly by distance.
    pub distance_penalty_weight: f64,
    pub specialty_mismatch_penalty: f64,
    /// Points added when every required specialty matches, scaled by the matched share.
    pub specialty_match_bonus: f64,
    pub language_bonus: f64,
    pub slot_increment_minutes: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            base_score: 100.0,
            distance_penalty_weight: 20.0,
            specialty_mismatch_penalty: 30.0,
            specialty_match_bonus: 10.0,
            language_bonus: 10.0,
            slot_increment_minutes: DEFAULT_SLOT_INCREMENT_MINUTES,
        }
    }
}
