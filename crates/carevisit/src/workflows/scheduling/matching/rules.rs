use crate::workflows::visits::domain::Caregiver;
use super::config::MatchingConfig;
use super::{MatchFactor, MatchRequest, ScoreComponent};

pub(crate) struct ScoreSignals {
    pub matched_specialties: Vec<String>,
    pub speaks_preferred_language: bool,
}

fn normalized(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

pub(crate) fn score_candidate(
    request: &MatchRequest,
    caregiver: &Caregiver,
    distance_miles: f64,
    config: &MatchingConfig,
) -> (Vec<ScoreComponent>, f64, ScoreSignals) {
    let mut components = Vec::new();
    let mut score = config.base_score;

    let radius = caregiver.service_radius_miles;
    let distance_penalty = if radius > 0.0 {
        (distance_miles / radius) * config.distance_penalty_weight
    } else {
        config.distance_penalty_weight
    };
    components.push(ScoreComponent {
        factor: MatchFactor::Distance,
        points: -distance_penalty,
        notes: format!("{distance_miles:.2} mi of {radius:.1} mi service radius"),
    });
    score -= distance_penalty;

    let mut matched_specialties = Vec::new();
    if let Some(required) = request
        .required_specialties
        .as_ref()
        .filter(|required| !required.is_empty())
    {
        let offered: Vec<String> = caregiver
            .specialties
            .iter()
            .map(|specialty| normalized(specialty))
            .collect();
        matched_specialties = required
            .iter()
            .filter(|specialty| offered.contains(&normalized(specialty)))
            .cloned()
            .collect();

        if matched_specialties.is_empty() {
            components.push(ScoreComponent {
                factor: MatchFactor::Specialty,
                points: -config.specialty_mismatch_penalty,
                notes: format!("none of {} required specialties", required.len()),
            });
            score -= config.specialty_mismatch_penalty;
        } else {
            let share = matched_specialties.len() as f64 / required.len() as f64;
            let bonus = share * config.specialty_match_bonus;
            components.push(ScoreComponent {
                factor: MatchFactor::Specialty,
                points: bonus,
                notes: format!(
                    "{} of {} required specialties",
                    matched_specialties.len(),
                    required.len()
                ),
            });
            score += bonus;
        }
    }

    let speaks_preferred_language = request
        .preferred_language
        .as_deref()
        .map(|language| {
            let wanted = normalized(language);
            caregiver
                .languages
                .iter()
                .any(|spoken| normalized(spoken) == wanted)
        })
        .unwrap_or(false);
    if speaks_preferred_language {
        components.push(ScoreComponent {
            factor: MatchFactor::Language,
            points: config.language_bonus,
            notes: "speaks preferred language".to_string(),
        });
        score += config.language_bonus;
    }

    let signals = ScoreSignals {
        matched_specialties,
        speaks_preferred_language,
    };

    (components, score.clamp(0.0, 100.0), signals)
}
