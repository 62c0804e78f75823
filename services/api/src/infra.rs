use carevisit::geo::GeoPoint;
use carevisit::workflows::visits::{
    Caregiver, CaregiverId, CaregiverStatus, InMemoryVisitStore, PatientHome, PatientHomeId,
    PatientId, RepositoryError, Visit, VisitId, VisitPriority, VisitRepository, VisitStatus,
    VisitType, WeeklyAvailabilitySlot,
};
use chrono::{NaiveDate, NaiveTime};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn wall_clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn strings(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn demo_caregiver(
    id: &str,
    name: &str,
    home: GeoPoint,
    radius_miles: f64,
    max_daily_visits: u32,
    specialties: &[&str],
    languages: &[&str],
) -> Caregiver {
    Caregiver {
        id: CaregiverId::new(id),
        name: name.to_string(),
        home_location: Some(home),
        service_radius_miles: radius_miles,
        max_daily_visits,
        max_weekly_hours: 40,
        specialties: strings(specialties),
        languages: strings(languages),
        status: CaregiverStatus::Active,
        current_location: None,
        location_updated_at: None,
    }
}

fn demo_home(
    id: &str,
    address: &str,
    location: Option<GeoPoint>,
    radius: Option<u32>,
) -> PatientHome {
    PatientHome {
        id: PatientHomeId::new(id),
        patient_id: PatientId::new(format!("patient-{id}")),
        address: address.to_string(),
        location,
        geofence_radius_meters: radius,
    }
}

fn demo_visit(
    id: &str,
    home_id: &str,
    caregiver_id: Option<&str>,
    date: NaiveDate,
    (start, end): (NaiveTime, NaiveTime),
    visit_type: VisitType,
    priority: VisitPriority,
) -> Visit {
    Visit {
        id: VisitId::new(id),
        patient_id: PatientId::new(format!("patient-{home_id}")),
        patient_home_id: PatientHomeId::new(home_id),
        caregiver_id: caregiver_id.map(CaregiverId::new),
        scheduled_date: date,
        scheduled_start: start,
        scheduled_end: end,
        estimated_duration_minutes: u32::try_from((end - start).num_minutes()).unwrap_or(0),
        visit_type,
        priority,
        status: VisitStatus::Scheduled,
        actual_start: None,
        actual_end: None,
        actual_duration_minutes: None,
        start_location: None,
        end_location: None,
        clinical_notes: None,
        caregiver_signature: None,
        patient_signature: None,
        signed_at: None,
    }
}

pub(crate) const DEMO_CAREGIVER: &str = "cg-ava";
pub(crate) const DEMO_VISIT: &str = "v-1001";
pub(crate) const DEMO_OPEN_VISIT: &str = "v-1003";

/// Three caregivers, four homes and four visits on `date`, two of them still unassigned.
pub(crate) fn seed_demo_agency(
    store: &InMemoryVisitStore,
    date: NaiveDate,
) -> Result<(), RepositoryError> {
    let caregivers = [
        demo_caregiver(
            DEMO_CAREGIVER,
            "Ava Thompson",
            GeoPoint::new(39.9526, -75.1652),
            12.0,
            5,
            &["wound care", "diabetes"],
            &["English", "Spanish"],
        ),
        demo_caregiver(
            "cg-ben",
            "Ben Okafor",
            GeoPoint::new(39.9800, -75.1500),
            8.0,
            4,
            &["dementia"],
            &["English"],
        ),
        demo_caregiver(
            "cg-cara",
            "Cara Lindqvist",
            GeoPoint::new(40.0500, -75.3000),
            5.0,
            3,
            &[],
            &["English"],
        ),
    ];
    for caregiver in caregivers {
        let id = caregiver.id.clone();
        store.insert_caregiver(caregiver)?;
        let week = (0..=6)
            .map(|day_of_week| WeeklyAvailabilitySlot {
                caregiver_id: id.clone(),
                day_of_week,
                start_time: wall_clock(8, 0),
                end_time: wall_clock(18, 0),
                is_available: true,
            })
            .collect();
        store.replace_availability(&id, week)?;
    }

    for home in [
        demo_home("home-elm", "118 Elm Street", Some(GeoPoint::new(39.9612, -75.1580)), None),
        demo_home("home-oak", "47 Oak Avenue", Some(GeoPoint::new(39.9700, -75.1400)), Some(150)),
        demo_home("home-pine", "9 Pine Court", Some(GeoPoint::new(39.9450, -75.1700)), None),
        demo_home("home-rural", "Rural Route 4", None, None),
    ] {
        store.insert_patient_home(home)?;
    }

    let visits = vec![
        demo_visit(
            DEMO_VISIT,
            "home-elm",
            Some(DEMO_CAREGIVER),
            date,
            (wall_clock(9, 0), wall_clock(10, 0)),
            VisitType::SkilledNursing,
            VisitPriority::High,
        ),
        demo_visit(
            "v-1002",
            "home-pine",
            Some(DEMO_CAREGIVER),
            date,
            (wall_clock(11, 0), wall_clock(12, 0)),
            VisitType::PersonalCare,
            VisitPriority::Normal,
        ),
        demo_visit(
            DEMO_OPEN_VISIT,
            "home-oak",
            None,
            date,
            (wall_clock(13, 0), wall_clock(14, 30)),
            VisitType::PersonalCare,
            VisitPriority::Normal,
        ),
        demo_visit(
            "v-1004",
            "home-rural",
            None,
            date,
            (wall_clock(10, 0), wall_clock(11, 0)),
            VisitType::Companion,
            VisitPriority::Low,
        ),
    ];
    store.upsert_visits(visits)?;

    Ok(())
}
