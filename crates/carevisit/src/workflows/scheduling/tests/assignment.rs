use super::common::*;
use crate::geo::GeoPoint;
use crate::workflows::scheduling::SchedulingService;
use crate::workflows::visits::domain::{CaregiverId, VisitId, VisitStatus};
use crate::workflows::visits::repository::VisitRepository;
use crate::workflows::scheduling::SchedulingConfig;
use std::sync::Arc;

#[test]
fn unassigned_scheduled_visits_receive_the_top_match() {
    let store = seeded_store();
    store
        .insert_patient_home(patient_home("home-far", Some(GeoPoint::new(40.5, -75.0))))
        .expect("home seeded");
    store
        .insert_patient_home(patient_home("home-unmapped", None))
        .expect("home seeded");
    store
        .insert_visit(visit("v-1", "home-1", None, at(9, 0), at(10, 0)))
        .expect("visit seeded");
    store
        .insert_visit(visit("v-2", "home-1", None, at(11, 0), at(12, 0)))
        .expect("visit seeded");
    store
        .insert_visit(visit("v-far", "home-far", None, at(13, 0), at(14, 0)))
        .expect("visit seeded");
    store
        .insert_visit(visit("v-unmapped", "home-unmapped", None, at(14, 0), at(15, 0)))
        .expect("visit seeded");
    store
        .insert_visit(visit("v-orphan", "home-deleted", None, at(15, 0), at(16, 0)))
        .expect("visit seeded");
    let mut confirmed = visit("v-confirmed", "home-1", None, at(16, 0), at(17, 0));
    confirmed.status = VisitStatus::Confirmed;
    store.insert_visit(confirmed).expect("visit seeded");
    let (service, repository) = build_service(store);

    let assignments = service
        .auto_assign_caregivers(service_date())
        .expect("auto-assign runs");

    let assigned: Vec<&str> = assignments.iter().map(|a| a.visit_id.as_str()).collect();
    assert_eq!(assigned, vec!["v-1", "v-2"]);
    assert!(assignments
        .iter()
        .all(|assignment| assignment.caregiver_id == CaregiverId::new("cg-1")));
    assert_eq!(assignments[0].distance_miles, 3.45);

    let stored = repository
        .visit(&VisitId::new("v-1"))
        .expect("lookup")
        .expect("visit present");
    assert_eq!(stored.caregiver_id, Some(CaregiverId::new("cg-1")));

    for untouched in ["v-far", "v-unmapped", "v-orphan", "v-confirmed"] {
        let visit = repository
            .visit(&VisitId::new(untouched))
            .expect("lookup")
            .expect("visit present");
        assert_eq!(visit.caregiver_id, None, "{untouched} should stay unassigned");
    }

    let rerun = service
        .auto_assign_caregivers(service_date())
        .expect("second run");
    assert!(rerun.is_empty());
}

#[test]
fn assignments_within_a_run_respect_the_daily_cap() {
    let store = seeded_store();
    let mut limited = caregiver("cg-1", CAREGIVER_HOME);
    limited.max_daily_visits = 1;
    store.update_caregiver(limited).expect("caregiver updated");
    store
        .insert_visit(visit("v-1", "home-1", None, at(9, 0), at(10, 0)))
        .expect("visit seeded");
    store
        .insert_visit(visit("v-2", "home-1", None, at(11, 0), at(12, 0)))
        .expect("visit seeded");
    let service = SchedulingService::new(Arc::new(store), SchedulingConfig::default());

    let assignments = service
        .auto_assign_caregivers(service_date())
        .expect("auto-assign runs");

    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].visit_id.as_str(), "v-1");
}

#[test]
fn repository_failures_abort_the_run() {
    let service = SchedulingService::new(
        Arc::new(UnavailableRepository),
        SchedulingConfig::default(),
    );

    assert!(service.auto_assign_caregivers(service_date()).is_err());
}
