use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Actor, LinkId, RegistrationId};
use super::link::LinkRejection;
use super::notifier::Notifier;
use super::repository::{RegistrationStore, StoreError};
use super::service::{
    CreateLinkRequest, RegistrationService, SubmissionRequest, UpdateLinkRequest, WorkflowError,
};

/// Routes reachable without credentials: link validation, submission,
/// and token-based status polling.
pub fn public_routes<S, N>(service: Arc<RegistrationService<S, N>>) -> Router
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/public/links/:code/validate",
            get(validate_handler::<S, N>),
        )
        .route(
            "/api/v1/public/registrations",
            post(submit_handler::<S, N>),
        )
        .route(
            "/api/v1/public/registrations/:token/status",
            get(status_handler::<S, N>),
        )
        .with_state(service)
}

/// Admin routes. Handlers read the pre-authenticated [`Actor`] from a
/// request extension; the boundary that checked credentials must insert
/// it (see the API service's bearer middleware).
pub fn admin_routes<S, N>(service: Arc<RegistrationService<S, N>>) -> Router
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/admin/links", post(create_link_handler::<S, N>))
        .route(
            "/api/v1/admin/links/:id",
            get(link_detail_handler::<S, N>)
                .put(update_link_handler::<S, N>)
                .delete(delete_link_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/links/:id/export",
            get(export_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/registrations/:id",
            get(registration_detail_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/registrations/:id/approve",
            post(approve_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/registrations/:id/reject",
            post(reject_handler::<S, N>),
        )
        .with_state(service)
}

/// Combined router for tests and single-process deployments.
pub fn registration_router<S, N>(service: Arc<RegistrationService<S, N>>) -> Router
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    public_routes(service.clone()).merge(admin_routes(service))
}

fn error_response(err: WorkflowError) -> Response {
    let status = match &err {
        WorkflowError::Link(LinkRejection::NotFound) => StatusCode::NOT_FOUND,
        WorkflowError::Link(_) | WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
        WorkflowError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        WorkflowError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}

pub(crate) async fn validate_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Path(code): Path<String>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.validate_link(&code) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Json(request): Json<SubmissionRequest>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.submit(request) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Path(token): Path<String>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.status(&token) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_link_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateLinkRequest>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.create_link(request, &actor) {
        Ok(link) => (StatusCode::CREATED, Json(link)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn link_detail_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.link_detail(&LinkId(id)) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_link_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<UpdateLinkRequest>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.update_link(&LinkId(id), request, &actor) {
        Ok(link) => (StatusCode::OK, Json(link)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_link_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.delete_link(&LinkId(id), &actor) {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "message": "Link deleted successfully" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn export_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.export_registrations(&LinkId(id)) {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"registrations.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn registration_detail_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.registration_detail(&RegistrationId(id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn approve_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.approve(&RegistrationId(id), &actor) {
        Ok(registration) => (StatusCode::OK, Json(registration)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    #[serde(default)]
    pub(crate) reason: String,
}

pub(crate) async fn reject_handler<S, N>(
    State(service): State<Arc<RegistrationService<S, N>>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Response
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    match service.reject(&RegistrationId(id), &actor, &request.reason) {
        Ok(registration) => (StatusCode::OK, Json(registration)).into_response(),
        Err(err) => error_response(err),
    }
}
