use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::evv::{evv_router, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
use crate::workflows::visits::memory::InMemoryVisitStore;

fn router_with(store: InMemoryVisitStore) -> axum::Router {
    let (service, _, _) = build_service(store, on_visit_day(9, 0));
    evv_router(Arc::new(service))
}

fn request(method: &str, uri: &str, actor: Option<(&str, &str)>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some((id, role)) = actor {
        builder = builder
            .header(ACTOR_ID_HEADER, id)
            .header(ACTOR_ROLE_HEADER, role);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn home_fix() -> Value {
    json!({"location": {"latitude": 40.0, "longitude": -75.0, "accuracy": 5.0}})
}

#[tokio::test]
async fn clock_in_route_returns_created_with_verification() {
    let router = router_with(seeded_store());

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/evv/visits/v-1/clock-in",
            Some(("cg-1", "caregiver")),
            home_fix(),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["verification"]["distance_from_home"], json!(0));
    assert_eq!(payload["verification"]["is_within_geofence"], json!(true));
    assert_eq!(payload["visit"]["status"], json!("arrived"));
    assert_eq!(payload["warning"], Value::Null);
}

#[tokio::test]
async fn missing_actor_headers_are_unauthorized() {
    let router = router_with(seeded_store());

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/evv/visits/v-1/clock-in",
            None,
            home_fix(),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_role_is_unauthorized() {
    let router = router_with(seeded_store());

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/evv/visits/v-1/clock-in",
            Some(("cg-1", "janitor")),
            home_fix(),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn clock_in_route_maps_service_errors() {
    let cases = [
        ("/api/v1/evv/visits/v-404/clock-in", ("cg-1", "caregiver"), StatusCode::NOT_FOUND),
        ("/api/v1/evv/visits/v-1/clock-in", ("cg-9", "caregiver"), StatusCode::FORBIDDEN),
        ("/api/v1/evv/visits/v-1/clock-in", ("sched-1", "scheduler"), StatusCode::FORBIDDEN),
    ];

    for (uri, actor, expected) in cases {
        let router = router_with(seeded_store());
        let response = router
            .oneshot(request("POST", uri, Some(actor), home_fix()))
            .await
            .expect("route executes");
        assert_eq!(response.status(), expected, "{uri} as {actor:?}");
    }
}

#[tokio::test]
async fn second_clock_in_conflicts() {
    let router = router_with(seeded_store());

    let first = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/evv/visits/v-1/clock-in",
            Some(("cg-1", "caregiver")),
            home_fix(),
        ))
        .await
        .expect("route executes");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = router
        .oneshot(request(
            "POST",
            "/api/v1/evv/visits/v-1/clock-in",
            Some(("cg-1", "caregiver")),
            home_fix(),
        ))
        .await
        .expect("route executes");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn verify_route_reports_distance_without_recording() {
    let router = router_with(seeded_store());

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/evv/visits/v-1/verify",
            None,
            json!({"latitude": 40.0045, "longitude": -75.0}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["is_within_geofence"], json!(false));
    assert_eq!(payload["geofence_radius"], json!(100));

    let history = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/evv/visits/v-1/records")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(history).await;
    assert_eq!(payload["total"], json!(0));
}

#[tokio::test]
async fn unmapped_home_is_unprocessable() {
    let store = seeded_store();
    store
        .insert_visit(visit("v-rural", "home-unmapped", at(11, 0), at(12, 0)))
        .expect("visit seeded");
    let router = router_with(store);

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/evv/visits/v-rural/verify",
            None,
            json!({"latitude": 40.0, "longitude": -75.0}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn compliance_route_lists_issues() {
    let router = router_with(seeded_store());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/evv/visits/v-1/compliance")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["is_compliant"], json!(false));
    assert_eq!(payload["issues"][0]["kind"], json!("missing_clock_in"));
}

#[tokio::test]
async fn bulk_route_summarises_reports() {
    let router = router_with(seeded_store());

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/evv/compliance/bulk",
            None,
            json!({"visit_ids": ["v-1", "v-404"]}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], json!(2));
    assert_eq!(payload["compliant"], json!(0));
    assert_eq!(payload["reports"][1]["issues"][0]["kind"], json!("report_unavailable"));
}

#[tokio::test]
async fn export_route_returns_csv() {
    let router = router_with(seeded_store());

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/evv/compliance/export",
            None,
            json!({"visit_ids": ["v-1"]}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let text = String::from_utf8(body.to_vec()).expect("utf-8 csv");
    assert!(text.starts_with("visit_id,caregiver_id"));
    assert!(text.contains("v-1,cg-1,2025-03-03,no,3,yes,"));
}

#[tokio::test]
async fn statistics_route_parses_the_range() {
    let router = router_with(seeded_store());

    let ok = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/evv/statistics?start=2025-03-01&end=2025-03-07&caregiver_id=cg-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(ok.status(), StatusCode::OK);
    let payload = read_json_body(ok).await;
    assert_eq!(payload["total_visits"], json!(0));
    assert_eq!(payload["status_breakdown"]["scheduled"], json!(1));

    let inverted = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/evv/statistics?start=2025-03-07&end=2025-03-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(inverted.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn override_route_requires_a_supervisor() {
    let (service, _, _) = build_service(seeded_store(), on_visit_day(9, 0));
    let outcome = service
        .clock_in(
            &crate::workflows::visits::domain::VisitId::new("v-1"),
            &caregiver_actor(),
            clock_in_request(five_hundred_meters_out()),
        )
        .expect("clock-in recorded");
    let uri = format!("/api/v1/evv/records/{}/override", outcome.record.id);
    let router = evv_router(Arc::new(service));

    let denied = router
        .clone()
        .oneshot(request(
            "POST",
            &uri,
            Some(("cg-1", "caregiver")),
            json!({"reason": "signal loss"}),
        ))
        .await
        .expect("route executes");
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let granted = router
        .oneshot(request(
            "POST",
            &uri,
            Some(("sup-1", "supervisor")),
            json!({"reason": "signal loss"}),
        ))
        .await
        .expect("route executes");
    assert_eq!(granted.status(), StatusCode::OK);
    let payload = read_json_body(granted).await;
    assert_eq!(payload["is_verified"], json!(true));
    assert_eq!(payload["verification_method"], json!("manual_override"));
}
