use crate::infra::{seed_demo_agency, DEMO_CAREGIVER, DEMO_OPEN_VISIT, DEMO_VISIT};
use carevisit::config::VisitPolicyConfig;
use carevisit::error::AppError;
use carevisit::geo::ReportedLocation;
use carevisit::workflows::evv::{ClockInRequest, ClockOutRequest, EvvService, FixedClock};
use carevisit::workflows::scheduling::{
    MatchRequest, SchedulingService, SchedulingServiceError,
};
use carevisit::workflows::visits::{
    Actor, ActorRole, CaregiverId, DeviceMetadata, InMemoryVisitStore, PatientHomeId, VisitId,
    VisitRepository, VisitType,
};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Service date for the seeded visits (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Stop after matching, auto-assignment and routing.
    #[arg(long)]
    pub(crate) skip_evv: bool,
}

fn print_json<T: Serialize>(heading: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("\n{heading}\n{json}"),
        Err(err) => println!("\n{heading}\n  unavailable: {err}"),
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let policy = VisitPolicyConfig::from_env()?;

    println!("Home-care visit coordination demo for {date}");
    let store = Arc::new(InMemoryVisitStore::new());
    seed_demo_agency(&store, date).map_err(SchedulingServiceError::from)?;
    let scheduling = SchedulingService::new(store.clone(), policy.scheduling.clone());

    let open_home = store
        .patient_home(&PatientHomeId::new("home-oak"))
        .map_err(SchedulingServiceError::from)?
        .and_then(|home| home.location);
    if let Some(patient_location) = open_home {
        let request = MatchRequest {
            patient_location,
            visit_type: VisitType::PersonalCare,
            required_specialties: None,
            preferred_language: Some("Spanish".to_string()),
            date,
            duration_minutes: 90,
        };
        let matches = scheduling.find_matching_caregivers(&request)?;
        println!("\nCandidates for visit {DEMO_OPEN_VISIT}:");
        for candidate in &matches {
            println!(
                "- {} ({}): score {:.1}, {:.2} mi, first slot {}",
                candidate.caregiver_name,
                candidate.caregiver_id,
                candidate.score,
                candidate.distance_miles,
                candidate
                    .available_slots
                    .first()
                    .map(|slot| slot.format("%H:%M").to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
        }
    }

    let assignments = scheduling.auto_assign_caregivers(date)?;
    print_json("Auto-assignment", &assignments);

    let caregiver_id = CaregiverId::new(DEMO_CAREGIVER);
    let route = scheduling.optimize_route(&caregiver_id, date)?;
    print_json(&format!("Daily route for {DEMO_CAREGIVER}"), &route);

    if args.skip_evv {
        return Ok(());
    }

    let visit_id = VisitId::new(DEMO_VISIT);
    let Some(visit) = store.visit(&visit_id).map_err(SchedulingServiceError::from)? else {
        println!("\nVisit {DEMO_VISIT} missing from the seeded agency");
        return Ok(());
    };
    let Some(home) = store
        .patient_home(&visit.patient_home_id)
        .map_err(SchedulingServiceError::from)?
        .and_then(|home| home.location)
    else {
        println!("\nVisit {DEMO_VISIT} has no mapped home; skipping verification");
        return Ok(());
    };

    let start = visit.scheduled_start_at() + Duration::minutes(4);
    let clock = Arc::new(FixedClock::new(start));
    let evv = EvvService::with_clock(store.clone(), policy.evv.clone(), clock.clone());
    let actor = Actor::new(DEMO_CAREGIVER, ActorRole::Caregiver);
    let device = DeviceMetadata {
        device_id: Some("demo-tablet".to_string()),
        user_agent: Some("carevisit-demo".to_string()),
        ip_address: None,
    };
    let fix = ReportedLocation {
        accuracy: Some(8.0),
        ..ReportedLocation::from(home)
    };

    let clock_in = evv.clock_in(
        &visit_id,
        &actor,
        ClockInRequest {
            location: fix,
            device: device.clone(),
        },
    )?;
    print_json("Clock-in", &clock_in.verification);

    clock.advance(Duration::minutes(58));
    let clock_out = evv.clock_out(
        &visit_id,
        &actor,
        ClockOutRequest {
            location: fix,
            device,
            patient_signature: Some("M. Alvarez".to_string()),
            clinical_notes: Some("Dressing changed; wound healing well.".to_string()),
        },
    )?;
    println!(
        "\nClock-out recorded after {} minutes",
        clock_out.visit.actual_duration_minutes.unwrap_or_default()
    );

    let report = evv.generate_compliance_report(&visit_id)?;
    print_json("Compliance report", &report);

    Ok(())
}
