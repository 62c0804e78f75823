use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::clock::Clock;
use super::service::{
    ClockInRequest, ClockOutRequest, EvvService, EvvServiceError, LocationUpdateRequest,
    SignatureRequest,
};
use crate::geo::ReportedLocation;
use crate::workflows::visits::domain::{Actor, ActorRole, CaregiverId, EvvRecordId, VisitId};
use crate::workflows::visits::repository::{
    DateRange, PageRequest, RepositoryError, VisitRepository,
};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Router builder exposing clock-in/out, verification and compliance endpoints.
pub fn evv_router<R, C>(service: Arc<EvvService<R, C>>) -> Router
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route(
            "/api/v1/evv/visits/:visit_id/clock-in",
            post(clock_in_handler::<R, C>),
        )
        .route(
            "/api/v1/evv/visits/:visit_id/clock-out",
            post(clock_out_handler::<R, C>),
        )
        .route(
            "/api/v1/evv/visits/:visit_id/location",
            post(location_handler::<R, C>),
        )
        .route(
            "/api/v1/evv/visits/:visit_id/signature",
            post(signature_handler::<R, C>),
        )
        .route(
            "/api/v1/evv/visits/:visit_id/verify",
            post(verify_handler::<R, C>),
        )
        .route(
            "/api/v1/evv/visits/:visit_id/compliance",
            get(compliance_handler::<R, C>),
        )
        .route(
            "/api/v1/evv/visits/:visit_id/records",
            get(history_handler::<R, C>),
        )
        .route("/api/v1/evv/compliance/bulk", post(bulk_handler::<R, C>))
        .route("/api/v1/evv/compliance/export", post(export_handler::<R, C>))
        .route("/api/v1/evv/statistics", get(statistics_handler::<R, C>))
        .route(
            "/api/v1/evv/records/:record_id/override",
            post(override_handler::<R, C>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct VisitBatch {
    pub(crate) visit_ids: Vec<VisitId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatisticsQuery {
    pub(crate) start: NaiveDate,
    pub(crate) end: NaiveDate,
    #[serde(default)]
    pub(crate) caregiver_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default)]
    pub(crate) page: Option<usize>,
    #[serde(default)]
    pub(crate) per_page: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverrideRequest {
    pub(crate) reason: String,
}

fn parse_role(raw: &str) -> Option<ActorRole> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "caregiver" => Some(ActorRole::Caregiver),
        "scheduler" => Some(ActorRole::Scheduler),
        "supervisor" => Some(ActorRole::Supervisor),
        "admin" => Some(ActorRole::Admin),
        _ => None,
    }
}

/// Read the gateway-authenticated caller from the actor headers.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let Some(id) = value(ACTOR_ID_HEADER) else {
        let payload = json!({ "error": "missing X-Actor-Id header" });
        return Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response());
    };
    let Some(role) = value(ACTOR_ROLE_HEADER).and_then(parse_role) else {
        let payload = json!({ "error": "missing or unknown X-Actor-Role header" });
        return Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response());
    };

    Ok(Actor::new(id, role))
}

pub(crate) async fn clock_in_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Path(visit_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ClockInRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.clock_in(&VisitId(visit_id), &actor, request) {
        Ok(outcome) => (StatusCode::CREATED, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn clock_out_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Path(visit_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ClockOutRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.clock_out(&VisitId(visit_id), &actor, request) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn location_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Path(visit_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<LocationUpdateRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.record_location_update(&VisitId(visit_id), &actor, request) {
        Ok(outcome) => (StatusCode::CREATED, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn signature_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Path(visit_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<SignatureRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.capture_signature(&VisitId(visit_id), &actor, request) {
        Ok(outcome) => (StatusCode::CREATED, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn verify_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Path(visit_id): Path<String>,
    axum::Json(location): axum::Json<ReportedLocation>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    match service.verify_location(&VisitId(visit_id), &location) {
        Ok(verification) => (StatusCode::OK, axum::Json(verification)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn compliance_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Path(visit_id): Path<String>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    match service.generate_compliance_report(&VisitId(visit_id)) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Path(visit_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let defaults = PageRequest::default();
    let page = PageRequest::new(
        query.page.unwrap_or(defaults.page),
        query.per_page.unwrap_or(defaults.per_page),
    );
    match service.evv_history(&VisitId(visit_id), page) {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn bulk_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    axum::Json(batch): axum::Json<VisitBatch>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let reports = service.bulk_compliance_check(&batch.visit_ids);
    let compliant = reports.iter().filter(|report| report.is_compliant).count();
    let payload = json!({
        "total": reports.len(),
        "compliant": compliant,
        "reports": reports,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn export_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    axum::Json(batch): axum::Json<VisitBatch>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let mut buffer = Vec::new();
    match service.export_compliance_csv(&batch.visit_ids, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            buffer,
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn statistics_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Query(query): Query<StatisticsQuery>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let caregiver_id = query.caregiver_id.map(CaregiverId);
    match service.evv_statistics(DateRange::new(query.start, query.end), caregiver_id.as_ref()) {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn override_handler<R, C>(
    State(service): State<Arc<EvvService<R, C>>>,
    Path(record_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<OverrideRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.manual_override(&EvvRecordId(record_id), &request.reason, &actor) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: EvvServiceError) -> Response {
    let status = match &error {
        _ if error.is_not_found() => StatusCode::NOT_FOUND,
        EvvServiceError::InvalidTransition(_)
        | EvvServiceError::OpenTimeEntryExists(_)
        | EvvServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        EvvServiceError::CaregiverNotAssigned { .. } | EvvServiceError::Forbidden(_) => {
            StatusCode::FORBIDDEN
        }
        EvvServiceError::MissingHomeCoordinates(_) | EvvServiceError::InvalidRequest(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
