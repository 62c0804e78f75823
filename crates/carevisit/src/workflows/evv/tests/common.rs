use std::collections::BTreeSet;
use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::geo::{GeoPoint, ReportedLocation};
use crate::workflows::evv::{
    ClockInRequest, ClockOutRequest, EvvConfig, EvvService, FixedClock,
};
use crate::workflows::visits::domain::{
    Actor, ActorRole, Caregiver, CaregiverId, CaregiverStatus, DeviceMetadata, PatientHome,
    PatientHomeId, PatientId, Visit, VisitId, VisitPriority, VisitStatus, VisitType,
};
use crate::workflows::visits::memory::InMemoryVisitStore;

pub(super) const HOME: GeoPoint = GeoPoint::new(40.0, -75.0);

pub(super) type TestService = EvvService<InMemoryVisitStore, FixedClock>;

pub(super) fn visit_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date")
}

pub(super) fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub(super) fn on_visit_day(hour: u32, minute: u32) -> NaiveDateTime {
    visit_date().and_time(at(hour, minute))
}

pub(super) fn at_home() -> ReportedLocation {
    ReportedLocation {
        latitude: HOME.latitude,
        longitude: HOME.longitude,
        accuracy: Some(5.0),
    }
}

/// Roughly 500 meters north of the patient home.
pub(super) fn five_hundred_meters_out() -> ReportedLocation {
    ReportedLocation {
        latitude: 40.0045,
        longitude: HOME.longitude,
        accuracy: Some(5.0),
    }
}

pub(super) fn caregiver_actor() -> Actor {
    Actor::new("cg-1", ActorRole::Caregiver)
}

pub(super) fn supervisor_actor() -> Actor {
    Actor::new("sup-1", ActorRole::Supervisor)
}

pub(super) fn clock_in_request(location: ReportedLocation) -> ClockInRequest {
    ClockInRequest {
        location,
        device: DeviceMetadata {
            device_id: Some("tablet-7".to_string()),
            user_agent: None,
            ip_address: Some("10.0.0.7".to_string()),
        },
    }
}

pub(super) fn clock_out_request(
    location: ReportedLocation,
    signature: Option<&str>,
) -> ClockOutRequest {
    ClockOutRequest {
        location,
        device: DeviceMetadata::default(),
        patient_signature: signature.map(str::to_string),
        clinical_notes: None,
    }
}

pub(super) fn visit(id: &str, home_id: &str, start: NaiveTime, end: NaiveTime) -> Visit {
    Visit {
        id: VisitId::new(id),
        patient_id: PatientId::new("patient-1"),
        patient_home_id: PatientHomeId::new(home_id),
        caregiver_id: Some(CaregiverId::new("cg-1")),
        scheduled_date: visit_date(),
        scheduled_start: start,
        scheduled_end: end,
        estimated_duration_minutes: (end - start).num_minutes() as u32,
        visit_type: VisitType::SkilledNursing,
        priority: VisitPriority::High,
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

/// Caregiver cg-1, a mapped home, an unmapped home and visit v-1 at 09:00-10:00.
pub(super) fn seeded_store() -> InMemoryVisitStore {
    let store = InMemoryVisitStore::new();
    store
        .insert_caregiver(Caregiver {
            id: CaregiverId::new("cg-1"),
            name: "Avery Jones".to_string(),
            home_location: Some(GeoPoint::new(40.05, -75.0)),
            service_radius_miles: 15.0,
            max_daily_visits: 5,
            max_weekly_hours: 40,
            specialties: BTreeSet::new(),
            languages: BTreeSet::from(["English".to_string()]),
            status: CaregiverStatus::Active,
            current_location: None,
            location_updated_at: None,
        })
        .expect("caregiver seeded");
    store
        .insert_patient_home(PatientHome {
            id: PatientHomeId::new("home-1"),
            patient_id: PatientId::new("patient-1"),
            address: "40 Market Street".to_string(),
            location: Some(HOME),
            geofence_radius_meters: None,
        })
        .expect("home seeded");
    store
        .insert_patient_home(PatientHome {
            id: PatientHomeId::new("home-unmapped"),
            patient_id: PatientId::new("patient-2"),
            address: "Rural Route 9".to_string(),
            location: None,
            geofence_radius_meters: None,
        })
        .expect("home seeded");
    store
        .insert_visit(visit("v-1", "home-1", at(9, 0), at(10, 0)))
        .expect("visit seeded");
    store
}

pub(super) fn build_service(
    store: InMemoryVisitStore,
    now: NaiveDateTime,
) -> (TestService, Arc<InMemoryVisitStore>, Arc<FixedClock>) {
    let repository = Arc::new(store);
    let clock = Arc::new(FixedClock::new(now));
    let service = EvvService::with_clock(repository.clone(), EvvConfig::default(), clock.clone());
    (service, repository, clock)
}

/// Clock in at `start` and out at `end`, both at the home, with a patient signature.
pub(super) fn complete_visit(
    service: &TestService,
    clock: &FixedClock,
    visit_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) {
    let visit_id = VisitId::new(visit_id);
    clock.set(start);
    service
        .clock_in(&visit_id, &caregiver_actor(), clock_in_request(at_home()))
        .expect("clock-in succeeds");
    clock.set(end);
    service
        .clock_out(
            &visit_id,
            &caregiver_actor(),
            clock_out_request(at_home(), Some("P. Patient")),
        )
        .expect("clock-out succeeds");
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
