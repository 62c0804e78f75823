use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::geo::GeoPoint;
use crate::workflows::scheduling::{MatchRequest, SchedulingConfig, SchedulingService};
use crate::workflows::visits::domain::{
    Caregiver, CaregiverId, CaregiverStatus, EvvRecord, EvvRecordId, MileageEntry, PatientHome,
    PatientHomeId, PatientId, TimeEntry, Visit, VisitId, VisitPriority, VisitStatus, VisitType,
    WeeklyAvailabilitySlot,
};
use crate::workflows::visits::memory::InMemoryVisitStore;
use crate::workflows::visits::repository::{
    CaregiverFilter, ClockInCommit, ClockOutCommit, DateRange, Page, PageRequest,
    RepositoryError, VisitFilter, VisitRepository,
};

pub(super) const CAREGIVER_HOME: GeoPoint = GeoPoint::new(40.0, -75.0);
pub(super) const PATIENT_HOME: GeoPoint = GeoPoint::new(40.05, -75.0);

/// A Monday.
pub(super) fn service_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date")
}

pub(super) fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub(super) fn caregiver(id: &str, home: GeoPoint) -> Caregiver {
    Caregiver {
        id: CaregiverId::new(id),
        name: format!("Caregiver {id}"),
        home_location: Some(home),
        service_radius_miles: 10.0,
        max_daily_visits: 4,
        max_weekly_hours: 40,
        specialties: BTreeSet::from(["wound care".to_string(), "dementia".to_string()]),
        languages: BTreeSet::from(["English".to_string(), "Spanish".to_string()]),
        status: CaregiverStatus::Active,
        current_location: None,
        location_updated_at: None,
    }
}

pub(super) fn weekday_window(
    caregiver_id: &str,
    start: NaiveTime,
    end: NaiveTime,
) -> WeeklyAvailabilitySlot {
    WeeklyAvailabilitySlot {
        caregiver_id: CaregiverId::new(caregiver_id),
        day_of_week: 1,
        start_time: start,
        end_time: end,
        is_available: true,
    }
}

pub(super) fn patient_home(id: &str, location: Option<GeoPoint>) -> PatientHome {
    PatientHome {
        id: PatientHomeId::new(id),
        patient_id: PatientId::new(format!("patient-{id}")),
        address: "12 Elm Street".to_string(),
        location,
        geofence_radius_meters: None,
    }
}

pub(super) fn visit(
    id: &str,
    home_id: &str,
    caregiver_id: Option<&str>,
    start: NaiveTime,
    end: NaiveTime,
) -> Visit {
    Visit {
        id: VisitId::new(id),
        patient_id: PatientId::new(format!("patient-{home_id}")),
        patient_home_id: PatientHomeId::new(home_id),
        caregiver_id: caregiver_id.map(CaregiverId::new),
        scheduled_date: service_date(),
        scheduled_start: start,
        scheduled_end: end,
        estimated_duration_minutes: (end - start).num_minutes() as u32,
        visit_type: VisitType::PersonalCare,
        priority: VisitPriority::Normal,
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

pub(super) fn match_request() -> MatchRequest {
    MatchRequest {
        patient_location: PATIENT_HOME,
        visit_type: VisitType::PersonalCare,
        required_specialties: None,
        preferred_language: None,
        date: service_date(),
        duration_minutes: 60,
    }
}

/// One caregiver free 09:00-17:00 on Mondays and one patient home ~3.45 miles away.
pub(super) fn seeded_store() -> InMemoryVisitStore {
    let store = InMemoryVisitStore::new();
    store
        .insert_caregiver(caregiver("cg-1", CAREGIVER_HOME))
        .expect("caregiver seeded");
    store
        .replace_availability(
            &CaregiverId::new("cg-1"),
            vec![weekday_window("cg-1", at(9, 0), at(17, 0))],
        )
        .expect("availability seeded");
    store
        .insert_patient_home(patient_home("home-1", Some(PATIENT_HOME)))
        .expect("home seeded");
    store
}

pub(super) fn build_service(
    store: InMemoryVisitStore,
) -> (SchedulingService<InMemoryVisitStore>, Arc<InMemoryVisitStore>) {
    let repository = Arc::new(store);
    let service = SchedulingService::new(repository.clone(), SchedulingConfig::default());
    (service, repository)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl VisitRepository for UnavailableRepository {
    fn caregiver(&self, _id: &CaregiverId) -> Result<Option<Caregiver>, RepositoryError> {
        offline()
    }

    fn caregivers(&self, _filter: &CaregiverFilter) -> Result<Vec<Caregiver>, RepositoryError> {
        offline()
    }

    fn update_caregiver(&self, _caregiver: Caregiver) -> Result<(), RepositoryError> {
        offline()
    }

    fn patient_home(&self, _id: &PatientHomeId) -> Result<Option<PatientHome>, RepositoryError> {
        offline()
    }

    fn availability(
        &self,
        _caregiver_id: &CaregiverId,
        _day_of_week: u8,
    ) -> Result<Option<WeeklyAvailabilitySlot>, RepositoryError> {
        offline()
    }

    fn replace_availability(
        &self,
        _caregiver_id: &CaregiverId,
        _slots: Vec<WeeklyAvailabilitySlot>,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn visit(&self, _id: &VisitId) -> Result<Option<Visit>, RepositoryError> {
        offline()
    }

    fn visits(&self, _filter: &VisitFilter) -> Result<Vec<Visit>, RepositoryError> {
        offline()
    }

    fn update_visit(&self, _visit: Visit) -> Result<(), RepositoryError> {
        offline()
    }

    fn upsert_visits(&self, _visits: Vec<Visit>) -> Result<usize, RepositoryError> {
        offline()
    }

    fn count_visits_by_status(
        &self,
        _filter: &VisitFilter,
    ) -> Result<BTreeMap<VisitStatus, usize>, RepositoryError> {
        offline()
    }

    fn evv_record(&self, _id: &EvvRecordId) -> Result<Option<EvvRecord>, RepositoryError> {
        offline()
    }

    fn evv_records(&self, _visit_id: &VisitId) -> Result<Vec<EvvRecord>, RepositoryError> {
        offline()
    }

    fn evv_records_page(
        &self,
        _visit_id: &VisitId,
        _page: PageRequest,
    ) -> Result<Page<EvvRecord>, RepositoryError> {
        offline()
    }

    fn append_evv_record(&self, _record: EvvRecord) -> Result<EvvRecord, RepositoryError> {
        offline()
    }

    fn update_evv_record(&self, _record: EvvRecord) -> Result<(), RepositoryError> {
        offline()
    }

    fn open_time_entries(
        &self,
        _caregiver_id: &CaregiverId,
        _visit_id: &VisitId,
    ) -> Result<Vec<TimeEntry>, RepositoryError> {
        offline()
    }

    fn commit_clock_in(&self, _commit: ClockInCommit) -> Result<(), RepositoryError> {
        offline()
    }

    fn commit_clock_out(&self, _commit: ClockOutCommit) -> Result<(), RepositoryError> {
        offline()
    }

    fn insert_mileage(&self, _entry: MileageEntry) -> Result<MileageEntry, RepositoryError> {
        offline()
    }

    fn mileage_entries(
        &self,
        _caregiver_id: &CaregiverId,
        _range: DateRange,
    ) -> Result<Vec<MileageEntry>, RepositoryError> {
        offline()
    }
}
