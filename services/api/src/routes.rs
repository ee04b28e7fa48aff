use crate::infra::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use registration::router::server_error_response;
use registration::{registration_router, RegistrationService, UserRepository};
use serde_json::json;
use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Registration endpoint plus health, readiness, metrics and the uploaded files.
pub(crate) fn with_service_routes<R>(
    service: Arc<RegistrationService<R>>,
    public_root: &Path,
    max_upload_bytes: usize,
) -> axum::Router
where
    R: UserRepository + 'static,
{
    let uploads_folder = service.uploads_folder().trim_matches('/').to_string();
    let uploads_dir = public_root.join(&uploads_folder);

    registration_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .nest_service(&format!("/{uploads_folder}"), ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let listening = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let database = state.users.is_ready();

    if listening && database {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else if listening {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "disconnected" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(%detail, "request handler panicked");
    server_error_response(detail)
}
