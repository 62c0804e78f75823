//! Electronic visit verification exercised through the HTTP router: a visit is clocked in from
//! outside the geofence, completed, reviewed and signed off by a supervisor.

mod common {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use serde_json::Value;

    use carevisit::geo::GeoPoint;
    use carevisit::workflows::evv::{
        evv_router, EvvConfig, EvvService, FixedClock, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER,
    };
    use carevisit::workflows::visits::{
        Caregiver, CaregiverId, CaregiverStatus, InMemoryVisitStore, PatientHome, PatientHomeId,
        PatientId, Visit, VisitId, VisitPriority, VisitStatus, VisitType,
    };

    pub(super) fn visit_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).expect("valid date")
    }

    pub(super) fn at(hour: u32, minute: u32) -> NaiveDateTime {
        visit_day().and_time(NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time"))
    }

    fn store() -> InMemoryVisitStore {
        let store = InMemoryVisitStore::new();
        store
            .insert_caregiver(Caregiver {
                id: CaregiverId::new("cg-7"),
                name: "Jordan Reyes".to_string(),
                home_location: Some(GeoPoint::new(40.1, -75.0)),
                service_radius_miles: 20.0,
                max_daily_visits: 6,
                max_weekly_hours: 40,
                specialties: BTreeSet::new(),
                languages: BTreeSet::new(),
                status: CaregiverStatus::Active,
                current_location: None,
                location_updated_at: None,
            })
            .expect("caregiver seeded");
        store
            .insert_patient_home(PatientHome {
                id: PatientHomeId::new("home-22"),
                patient_id: PatientId::new("patient-22"),
                address: "22 Harbor View".to_string(),
                location: Some(GeoPoint::new(40.0, -75.0)),
                geofence_radius_meters: None,
            })
            .expect("home seeded");
        store
            .insert_visit(Visit {
                id: VisitId::new("v-22"),
                patient_id: PatientId::new("patient-22"),
                patient_home_id: PatientHomeId::new("home-22"),
                caregiver_id: Some(CaregiverId::new("cg-7")),
                scheduled_date: visit_day(),
                scheduled_start: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
                scheduled_end: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
                estimated_duration_minutes: 60,
                visit_type: VisitType::PhysicalTherapy,
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
            })
            .expect("visit seeded");
        store
    }

    pub(super) fn router() -> (axum::Router, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(at(9, 3)));
        let service = EvvService::with_clock(
            Arc::new(store()),
            EvvConfig::default(),
            clock.clone(),
        );
        (evv_router(Arc::new(service)), clock)
    }

    pub(super) fn post(uri: &str, actor: (&str, &str), body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(ACTOR_ID_HEADER, actor.0)
            .header(ACTOR_ROLE_HEADER, actor.1)
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request builds")
    }

    pub(super) fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    pub(super) async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body")
            .to_vec()
    }

    pub(super) async fn json_body(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).expect("json payload")
    }
}

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;
use tower::ServiceExt;

use common::*;

const CAREGIVER: (&str, &str) = ("cg-7", "caregiver");
const SUPERVISOR: (&str, &str) = ("sup-3", "supervisor");

#[tokio::test]
async fn off_site_clock_in_is_flagged_until_a_supervisor_signs_off() {
    let (router, clock) = router();

    let clock_in = router
        .clone()
        .oneshot(post(
            "/api/v1/evv/visits/v-22/clock-in",
            CAREGIVER,
            json!({
                "location": {"latitude": 40.0045, "longitude": -75.0, "accuracy": 12.0},
                "device": {"device_id": "phone-7"}
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(clock_in.status(), StatusCode::CREATED);
    let payload = json_body(clock_in).await;
    assert_eq!(payload["verification"]["is_within_geofence"], json!(false));
    assert!(payload["warning"].as_str().unwrap_or_default().contains("geofence"));
    let record_id = payload["record"]["id"]
        .as_str()
        .expect("record id")
        .to_string();

    clock.advance(Duration::minutes(57));
    let clock_out = router
        .clone()
        .oneshot(post(
            "/api/v1/evv/visits/v-22/clock-out",
            CAREGIVER,
            json!({
                "location": {"latitude": 40.0, "longitude": -75.0},
                "patient_signature": "L. Chen",
                "clinical_notes": "Gait training, 3 sets"
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(clock_out.status(), StatusCode::OK);
    let payload = json_body(clock_out).await;
    assert_eq!(payload["visit"]["status"], json!("completed"));
    assert_eq!(payload["visit"]["actual_duration_minutes"], json!(57));

    let flagged = json_body(
        router
            .clone()
            .oneshot(get("/api/v1/evv/visits/v-22/compliance"))
            .await
            .expect("route executes"),
    )
    .await;
    assert_eq!(flagged["is_compliant"], json!(false));
    assert_eq!(flagged["issues"][0]["kind"], json!("clock_in_unverified"));
    assert!(flagged["messages"][0]
        .as_str()
        .unwrap_or_default()
        .contains("~500m"));

    let override_uri = format!("/api/v1/evv/records/{record_id}/override");
    let denied = router
        .clone()
        .oneshot(post(&override_uri, CAREGIVER, json!({"reason": "was there"})))
        .await
        .expect("route executes");
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let granted = router
        .clone()
        .oneshot(post(
            &override_uri,
            SUPERVISOR,
            json!({"reason": "Patient confirmed arrival by phone"}),
        ))
        .await
        .expect("route executes");
    assert_eq!(granted.status(), StatusCode::OK);

    let cleared = json_body(
        router
            .clone()
            .oneshot(get("/api/v1/evv/visits/v-22/compliance"))
            .await
            .expect("route executes"),
    )
    .await;
    assert_eq!(cleared["is_compliant"], json!(true));

    let stats = json_body(
        router
            .clone()
            .oneshot(get("/api/v1/evv/statistics?start=2025-03-01&end=2025-03-07"))
            .await
            .expect("route executes"),
    )
    .await;
    assert_eq!(stats["total_visits"], json!(1));
    assert_eq!(stats["compliance_rate"], json!(100.0));

    let history = json_body(
        router
            .oneshot(get("/api/v1/evv/visits/v-22/records?per_page=10"))
            .await
            .expect("route executes"),
    )
    .await;
    assert_eq!(history["total"], json!(2));
    assert_eq!(history["items"][0]["verification_method"], json!("manual_override"));
    assert_eq!(history["items"][1]["record_type"], json!("clock_out"));
}

#[tokio::test]
async fn export_lists_every_requested_visit() {
    let (router, _) = router();

    let response = router
        .oneshot(post(
            "/api/v1/evv/compliance/export",
            SUPERVISOR,
            json!({"visit_ids": ["v-22", "v-missing"]}),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let csv = String::from_utf8(body_bytes(response).await).expect("utf-8 csv");
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].starts_with("v-22,cg-7,2025-03-04,no,3,yes,"));
    assert!(rows[2].starts_with("v-missing,,,no,1,no,"));
}
