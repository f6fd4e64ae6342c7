use crate::infra::AppState;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;
use std::sync::Arc;

use picnew::config::AuthConfig;
use picnew::workflows::registration::{
    admin_routes, public_routes, Actor, Notifier, RegistrationService, RegistrationStore,
};

/// Credentials the admin boundary checks before any admin handler runs.
/// On success the authenticated [`Actor`] is inserted as an extension;
/// the workflow layer never sees the token itself.
#[derive(Clone)]
pub(crate) struct AdminAuth {
    token: Option<String>,
    admin_user: String,
}

impl From<AuthConfig> for AdminAuth {
    fn from(config: AuthConfig) -> Self {
        Self {
            token: config.admin_token,
            admin_user: config.admin_user,
        }
    }
}

pub(crate) async fn require_admin(
    State(auth): State<AdminAuth>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(expected) = auth.token.as_deref() else {
        return unauthorized("admin access is not configured");
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => {
            request
                .extensions_mut()
                .insert(Actor::Admin(auth.admin_user.clone()));
            next.run(request).await
        }
        _ => unauthorized("invalid or missing bearer token"),
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Full application router: public workflow routes, the token-guarded
/// admin surface, and the operational endpoints.
pub(crate) fn app_router<S, N>(
    service: Arc<RegistrationService<S, N>>,
    auth: AdminAuth,
) -> axum::Router
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    public_routes(service.clone())
        .merge(admin_routes(service).layer(from_fn_with_state(auth, require_admin)))
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
