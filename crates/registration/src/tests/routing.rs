use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use super::common::*;
use crate::repository::MemoryUserRepository;
use crate::router::{registration_router, REGISTER_PATH};
use crate::service::RegistrationService;
use crate::storage::FileStorage;

#[tokio::test]
async fn register_returns_created_user() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, repository) = build_service(&dir);
    let app = registration_router(Arc::new(service));

    let response = app
        .oneshot(registration_request(&details()))
        .await
        .expect("register route");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["data"]["email"], "ann@x.com");
    assert_eq!(body["data"]["permanent"]["street1"], "1 Main");
    assert_eq!(body["data"]["documents"][1]["fileType"], "pdf");
    assert!(body["data"]["documents"][0]["fileUrl"]
        .as_str()
        .is_some_and(|url| url.starts_with("/uploads/")));
    assert!(body["data"]["createdAt"].is_string());
    assert_eq!(repository.users().expect("users").len(), 1);
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, repository) = build_service(&dir);
    let app = registration_router(Arc::new(service));

    let first = app
        .clone()
        .oneshot(registration_request(&details()))
        .await
        .expect("first request");
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(registration_request(&details()))
        .await
        .expect("second request");
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = read_json_body(second).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Email already exists!");
    assert_eq!(repository.users().expect("users").len(), 1);
}

#[tokio::test]
async fn missing_data_field_is_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, _repository) = build_service(&dir);
    let app = registration_router(Arc::new(service));

    let body = multipart_body(None, &[("id.png", "image/png", b"png".as_slice())]);
    let response = app
        .oneshot(multipart_request(body))
        .await
        .expect("register route");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Invalid data received");
    assert_eq!(body["error"], "missing data field");
}

#[tokio::test]
async fn malformed_data_json_is_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, _repository) = build_service(&dir);
    let app = registration_router(Arc::new(service));

    let body = multipart_body(Some("{not json"), &[]);
    let response = app
        .oneshot(multipart_request(body))
        .await
        .expect("register route");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid data received");
    assert!(stored_files(&dir, "uploads").is_empty());
}

#[tokio::test]
async fn non_multipart_body_is_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, _repository) = build_service(&dir);
    let app = registration_router(Arc::new(service));

    let request = Request::post(REGISTER_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"firstName":"Ann"}"#))
        .expect("request builds");
    let response = app.oneshot(request).await.expect("register route");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Invalid data received");
}

#[tokio::test]
async fn validation_errors_are_listed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, repository) = build_service(&dir);
    let app = registration_router(Arc::new(service));

    let mut invalid = details();
    invalid.first_name.clear();
    invalid.email = "not-an-email".to_string();
    let response = app
        .oneshot(registration_request(&invalid))
        .await
        .expect("register route");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Validation failed");
    let errors = body["errors"].as_array().expect("errors array");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["field"], "firstName");
    assert_eq!(errors[0]["message"], "First Name is required");
    assert_eq!(errors[1]["field"], "email");
    assert_eq!(errors[1]["message"], "Invalid email");
    assert!(repository.users().expect("users").is_empty());
}

#[tokio::test]
async fn storage_failure_is_server_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repository = MemoryUserRepository::default();
    let storage = FileStorage::local(dir.path()).with_remote(Arc::new(FailingObjectStore));
    let service = RegistrationService::new(Arc::new(repository.clone()), storage);
    let app = registration_router(Arc::new(service));

    let response = app
        .oneshot(registration_request(&details()))
        .await
        .expect("register route");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Server error");
    assert!(body["error"]
        .as_str()
        .is_some_and(|detail| detail.contains("quota exceeded")));
    assert!(repository.users().expect("users").is_empty());
}

#[tokio::test]
async fn unavailable_database_is_server_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service =
        RegistrationService::new(Arc::new(UnavailableRepository), FileStorage::local(dir.path()));
    let app = registration_router(Arc::new(service));

    let response = app
        .oneshot(registration_request(&details()))
        .await
        .expect("register route");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Server error");
}
