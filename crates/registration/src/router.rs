use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;
use tracing::{error, warn};

use crate::domain::RegistrationDetails;
use crate::repository::UserRepository;
use crate::service::{RegistrationError, RegistrationService, RegistrationSubmission};
use crate::storage::UploadedFile;

pub const REGISTER_PATH: &str = "/api/register";

/// Router builder exposing the registration endpoint.
pub fn registration_router<R>(service: Arc<RegistrationService<R>>) -> Router
where
    R: UserRepository + 'static,
{
    Router::new()
        .route(REGISTER_PATH, post(register_handler::<R>))
        .with_state(service)
}

pub(crate) async fn register_handler<R>(
    State(service): State<Arc<RegistrationService<R>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    R: UserRepository + 'static,
{
    let submission = match multipart {
        Ok(multipart) => read_submission(multipart).await,
        Err(rejection) => Err(RegistrationError::InvalidRequest(rejection.body_text())),
    };

    let outcome = match submission {
        Ok(submission) => service.register(submission).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(user) => {
            let payload = json!({
                "success": true,
                "message": "User registered successfully",
                "data": user,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Splits a multipart body into the `data` JSON field and the ordered `files` parts.
pub(crate) async fn read_submission(
    mut multipart: Multipart,
) -> Result<RegistrationSubmission, RegistrationError> {
    let mut details: Option<RegistrationDetails> = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| RegistrationError::InvalidRequest(err.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("data") => {
                if field.file_name().is_some() {
                    return Err(RegistrationError::InvalidRequest(
                        "data must be a text field".to_string(),
                    ));
                }
                let raw = field
                    .text()
                    .await
                    .map_err(|err| RegistrationError::InvalidRequest(err.body_text()))?;
                let parsed = serde_json::from_str(&raw).map_err(|err| {
                    RegistrationError::InvalidRequest(format!("data is not valid JSON: {err}"))
                })?;
                details = Some(parsed);
            }
            Some("files") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| RegistrationError::InvalidRequest(err.body_text()))?;
                files.push(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let details = details
        .ok_or_else(|| RegistrationError::InvalidRequest("missing data field".to_string()))?;
    Ok(RegistrationSubmission { details, files })
}

fn error_response(err: RegistrationError) -> Response {
    match err {
        RegistrationError::InvalidRequest(detail) => {
            warn!(%detail, "rejected malformed registration request");
            let payload = json!({
                "success": false,
                "message": "Invalid data received",
                "error": detail,
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        RegistrationError::Validation(errors) => {
            warn!(fields = errors.len(), "registration failed validation");
            let payload = json!({
                "success": false,
                "message": "Validation failed",
                "errors": errors,
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        RegistrationError::Conflict => {
            let payload = json!({
                "success": false,
                "message": "Email already exists!",
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => {
            error!(error = %other, "registration failed");
            server_error_response(other.to_string())
        }
    }
}

/// 500 body used for storage, database and otherwise unhandled failures.
pub fn server_error_response(detail: String) -> Response {
    let payload = json!({
        "success": false,
        "message": "Server error",
        "error": detail,
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
