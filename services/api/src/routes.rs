use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use carevisit::workflows::evv::{evv_router, Clock, EvvService};
use carevisit::workflows::scheduling::{scheduling_router, SchedulingService};
use carevisit::workflows::visits::VisitRepository;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_visit_routes<R, C>(
    scheduling: Arc<SchedulingService<R>>,
    evv: Arc<EvvService<R, C>>,
) -> axum::Router
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    scheduling_router(scheduling)
        .merge(evv_router(evv))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
