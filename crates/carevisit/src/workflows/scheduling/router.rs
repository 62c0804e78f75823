use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;

use super::matching::MatchRequest;
use super::service::{AvailabilityWindow, SchedulingService, SchedulingServiceError};
use crate::geo::ReportedLocation;
use crate::workflows::visits::domain::{CaregiverId, VisitId};
use crate::workflows::visits::repository::{RepositoryError, VisitRepository};

/// Router builder exposing matching, routing and availability endpoints.
pub fn scheduling_router<R>(service: Arc<SchedulingService<R>>) -> Router
where
    R: VisitRepository + 'static,
{
    Router::new()
        .route("/api/v1/scheduling/matches", post(matches_handler::<R>))
        .route(
            "/api/v1/scheduling/auto-assign/:date",
            post(auto_assign_handler::<R>),
        )
        .route(
            "/api/v1/scheduling/caregivers/:caregiver_id/routes/:date",
            get(route_handler::<R>),
        )
        .route(
            "/api/v1/scheduling/caregivers/:caregiver_id/slots",
            get(slots_handler::<R>),
        )
        .route(
            "/api/v1/scheduling/caregivers/:caregiver_id/availability",
            put(availability_handler::<R>),
        )
        .route(
            "/api/v1/scheduling/caregivers/:caregiver_id/location",
            post(location_handler::<R>),
        )
        .route(
            "/api/v1/scheduling/caregivers/:caregiver_id/eta/:visit_id",
            get(eta_handler::<R>),
        )
        .route(
            "/api/v1/scheduling/caregivers/:caregiver_id/mileage/:date",
            post(mileage_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlotsQuery {
    pub(crate) date: NaiveDate,
    pub(crate) duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocationPing {
    #[serde(flatten)]
    pub(crate) location: ReportedLocation,
    #[serde(default)]
    pub(crate) reported_at: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MileageRequest {
    #[serde(default)]
    pub(crate) rate_per_mile: Option<f64>,
}

pub(crate) async fn matches_handler<R>(
    State(service): State<Arc<SchedulingService<R>>>,
    axum::Json(request): axum::Json<MatchRequest>,
) -> Response
where
    R: VisitRepository + 'static,
{
    match service.find_matching_caregivers(&request) {
        Ok(matches) => (StatusCode::OK, axum::Json(matches)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn auto_assign_handler<R>(
    State(service): State<Arc<SchedulingService<R>>>,
    Path(date): Path<NaiveDate>,
) -> Response
where
    R: VisitRepository + 'static,
{
    match service.auto_assign_caregivers(date) {
        Ok(assignments) => {
            let payload = json!({
                "date": date,
                "assigned": assignments.len(),
                "assignments": assignments,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn route_handler<R>(
    State(service): State<Arc<SchedulingService<R>>>,
    Path((caregiver_id, date)): Path<(String, NaiveDate)>,
) -> Response
where
    R: VisitRepository + 'static,
{
    match service.optimize_route(&CaregiverId(caregiver_id), date) {
        Ok(route) => (StatusCode::OK, axum::Json(route)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn slots_handler<R>(
    State(service): State<Arc<SchedulingService<R>>>,
    Path(caregiver_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Response
where
    R: VisitRepository + 'static,
{
    let caregiver_id = CaregiverId(caregiver_id);
    match service.available_slots(&caregiver_id, query.date, query.duration_minutes) {
        Ok(slots) => {
            let slots: Vec<String> = slots
                .iter()
                .map(|slot| slot.format("%H:%M").to_string())
                .collect();
            let payload = json!({
                "caregiver_id": caregiver_id,
                "date": query.date,
                "duration_minutes": query.duration_minutes,
                "slots": slots,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn availability_handler<R>(
    State(service): State<Arc<SchedulingService<R>>>,
    Path(caregiver_id): Path<String>,
    axum::Json(windows): axum::Json<Vec<AvailabilityWindow>>,
) -> Response
where
    R: VisitRepository + 'static,
{
    match service.replace_weekly_availability(&CaregiverId(caregiver_id), windows) {
        Ok(slots) => (StatusCode::OK, axum::Json(slots)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn location_handler<R>(
    State(service): State<Arc<SchedulingService<R>>>,
    Path(caregiver_id): Path<String>,
    axum::Json(ping): axum::Json<LocationPing>,
) -> Response
where
    R: VisitRepository + 'static,
{
    let reported_at = ping
        .reported_at
        .unwrap_or_else(|| chrono::Local::now().naive_local());
    match service.update_caregiver_location(&CaregiverId(caregiver_id), ping.location, reported_at)
    {
        Ok(caregiver) => {
            let payload = json!({
                "caregiver_id": caregiver.id,
                "current_location": caregiver.current_location,
                "location_updated_at": caregiver.location_updated_at,
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn eta_handler<R>(
    State(service): State<Arc<SchedulingService<R>>>,
    Path((caregiver_id, visit_id)): Path<(String, String)>,
) -> Response
where
    R: VisitRepository + 'static,
{
    match service.next_visit_eta(&CaregiverId(caregiver_id), &VisitId(visit_id)) {
        Ok(eta) => (StatusCode::OK, axum::Json(eta)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn mileage_handler<R>(
    State(service): State<Arc<SchedulingService<R>>>,
    Path((caregiver_id, date)): Path<(String, NaiveDate)>,
    body: Option<axum::Json<MileageRequest>>,
) -> Response
where
    R: VisitRepository + 'static,
{
    let request = body.map(|axum::Json(request)| request).unwrap_or_default();
    match service.record_route_mileage(&CaregiverId(caregiver_id), date, request.rate_per_mile) {
        Ok(entry) => (StatusCode::CREATED, axum::Json(entry)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: SchedulingServiceError) -> Response {
    let status = match &error {
        _ if error.is_not_found() => StatusCode::NOT_FOUND,
        SchedulingServiceError::InvalidRequest(_)
        | SchedulingServiceError::Import(_)
        | SchedulingServiceError::MissingHomeCoordinates(_)
        | SchedulingServiceError::MissingCaregiverLocation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulingServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
