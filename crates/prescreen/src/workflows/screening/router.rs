use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use super::domain::{ApplicationDraft, ApplicationId, DocumentUpload};
use super::repository::{ApplicationRepository, AuditTrail};
use super::review::{ReviewDecisionRequest, DEFAULT_DAILY_MANUAL_CAPACITY};
use super::service::{ScreeningService, ScreeningServiceError};

/// Router builder exposing HTTP endpoints for intake, processing, and review.
pub fn application_router<R, A>(service: Arc<ScreeningService<R, A>>) -> Router
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(submit_handler::<R, A>))
        .route(
            "/api/v1/applications/queue/review",
            get(review_queue_handler::<R, A>),
        )
        .route(
            "/api/v1/applications/queue/metrics",
            get(queue_metrics_handler::<R, A>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(status_handler::<R, A>),
        )
        .route(
            "/api/v1/applications/:application_id/documents",
            post(attach_document_handler::<R, A>),
        )
        .route(
            "/api/v1/applications/:application_id/process",
            post(process_handler::<R, A>),
        )
        .route(
            "/api/v1/applications/:application_id/decision-breakdown",
            get(decision_breakdown_handler::<R, A>),
        )
        .route(
            "/api/v1/applications/:application_id/evidence-recommendations",
            get(evidence_recommendations_handler::<R, A>),
        )
        .route(
            "/api/v1/applications/:application_id/review-decision",
            post(review_decision_handler::<R, A>),
        )
        .route(
            "/api/v1/applications/:application_id/audit-trail",
            get(audit_trail_handler::<R, A>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProcessRequest {
    #[serde(default)]
    force_reprocess: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueuePage {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_page_limit")]
    limit: usize,
}

fn default_page_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub(crate) struct CapacityParams {
    #[serde(default = "default_capacity")]
    daily_manual_capacity: u32,
}

fn default_capacity() -> u32 {
    DEFAULT_DAILY_MANUAL_CAPACITY
}

pub(crate) async fn submit_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Json(draft): Json<ApplicationDraft>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.submit(draft) {
        Ok(record) => (StatusCode::CREATED, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn attach_document_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Path(application_id): Path<String>,
    Json(upload): Json<DocumentUpload>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.attach_document(&ApplicationId(application_id), upload) {
        Ok(document) => (StatusCode::CREATED, Json(document)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Queue the application and run the pipeline in the background; the response does not
/// wait for the run.
pub(crate) async fn process_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Path(application_id): Path<String>,
    request: Option<Json<ProcessRequest>>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    let id = ApplicationId(application_id);
    let force_reprocess = request.is_some_and(|Json(body)| body.force_reprocess);

    let record = match service.queue(&id, force_reprocess) {
        Ok(record) => record,
        Err(err) => return error_response(err),
    };

    let background = Arc::clone(&service);
    let run_id = id.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(err) = background.process(&run_id) {
            warn!(application_id = %run_id, error = %err, "background pre-screening failed");
        }
    });

    (StatusCode::ACCEPTED, Json(record.status_view())).into_response()
}

pub(crate) async fn decision_breakdown_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.decision_breakdown(&ApplicationId(application_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn evidence_recommendations_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.evidence_recommendations(&ApplicationId(application_id)) {
        Ok(recommendations) => (StatusCode::OK, Json(recommendations)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn review_queue_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Query(page): Query<QueuePage>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.review_queue(page.skip, page.limit) {
        Ok(queue) => (StatusCode::OK, Json(queue)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn queue_metrics_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Query(params): Query<CapacityParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.queue_metrics(params.daily_manual_capacity) {
        Ok(metrics) => (StatusCode::OK, Json(metrics)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn review_decision_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Path(application_id): Path<String>,
    Json(decision): Json<ReviewDecisionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.submit_review_decision(&ApplicationId(application_id), decision) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn audit_trail_handler<R, A>(
    State(service): State<Arc<ScreeningService<R, A>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    match service.audit_trail(&ApplicationId(application_id)) {
        Ok(trail) => (StatusCode::OK, Json(trail)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ScreeningServiceError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, "screening request failed");
    }
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
