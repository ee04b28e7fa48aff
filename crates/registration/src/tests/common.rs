use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use bytes::Bytes;
use chrono::NaiveDate;
use serde_json::Value;
use tempfile::TempDir;

use crate::domain::{
    Address, DocumentMetadata, FileType, NewUser, RegistrationDetails, StoredUser,
};
use crate::drive::{ObjectStore, ObjectStoreError, RemoteObject};
use crate::repository::{MemoryUserRepository, RepositoryError, UserRepository};
use crate::router::REGISTER_PATH;
use crate::service::{RegistrationService, RegistrationSubmission};
use crate::storage::{FileStorage, UploadedFile};

pub(super) const BOUNDARY: &str = "registration-test-boundary";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
}

pub(super) fn details() -> RegistrationDetails {
    RegistrationDetails {
        first_name: "Ann".to_string(),
        last_name: "Lee".to_string(),
        email: "ann@x.com".to_string(),
        dob: "2000-01-01".to_string(),
        residential: Address {
            street1: "1 Main".to_string(),
            street2: "Apt 2".to_string(),
        },
        permanent: Address::default(),
        same_as_residential: true,
        documents: vec![
            DocumentMetadata {
                file_name: "id".to_string(),
                file_type: Some(FileType::Image),
            },
            DocumentMetadata {
                file_name: "proof".to_string(),
                file_type: Some(FileType::Pdf),
            },
        ],
    }
}

pub(super) fn files() -> Vec<UploadedFile> {
    vec![
        UploadedFile {
            file_name: "id.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(b"\x89PNG fake image"),
        },
        UploadedFile {
            file_name: "proof.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: Bytes::from_static(b"%PDF-1.7 fake pdf"),
        },
    ]
}

pub(super) fn submission() -> RegistrationSubmission {
    RegistrationSubmission {
        details: details(),
        files: files(),
    }
}

pub(super) fn build_service(
    dir: &TempDir,
) -> (RegistrationService<MemoryUserRepository>, MemoryUserRepository) {
    let repository = MemoryUserRepository::default();
    let service = RegistrationService::new(
        Arc::new(repository.clone()),
        FileStorage::local(dir.path()),
    );
    (service, repository)
}

pub(super) fn stored_files(dir: &TempDir, folder: &str) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir.path().join(folder)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[derive(Debug, Default)]
pub(super) struct MemoryObjectStore {
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl MemoryObjectStore {
    pub(super) fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().expect("object store mutex poisoned").clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, object: RemoteObject<'_>) -> Result<String, ObjectStoreError> {
        let bytes = std::fs::read(object.local_path).map_err(|source| ObjectStoreError::Read {
            path: object.local_path.to_path_buf(),
            source,
        })?;
        self.uploads.lock().expect("object store mutex poisoned").push((
            object.name.to_string(),
            object.content_type.to_string(),
            bytes,
        ));
        Ok(format!("https://objects.test/{}", object.name))
    }
}

#[derive(Debug)]
pub(super) struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn upload(&self, _object: RemoteObject<'_>) -> Result<String, ObjectStoreError> {
        Err(ObjectStoreError::Backend("quota exceeded".to_string()))
    }
}

pub(super) struct UnavailableRepository;

#[async_trait]
impl UserRepository for UnavailableRepository {
    async fn find_by_email(&self, _email: &str) -> Result<Option<StoredUser>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn create(&self, _user: NewUser) -> Result<StoredUser, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Passes the duplicate check but loses the insert race.
pub(super) struct RacingRepository;

#[async_trait]
impl UserRepository for RacingRepository {
    async fn find_by_email(&self, _email: &str) -> Result<Option<StoredUser>, RepositoryError> {
        Ok(None)
    }

    async fn create(&self, _user: NewUser) -> Result<StoredUser, RepositoryError> {
        Err(RepositoryError::Conflict)
    }
}

pub(super) fn multipart_body(data: Option<&str>, files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(data) = data {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"data\"\r\n\r\n{data}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::post(REGISTER_PATH)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

pub(super) fn registration_request(details: &RegistrationDetails) -> Request<Body> {
    let data = serde_json::to_string(details).expect("details serialize");
    multipart_request(multipart_body(
        Some(&data),
        &[
            ("id.png", "image/png", b"\x89PNG fake image".as_slice()),
            ("proof.pdf", "application/pdf", b"%PDF-1.7 fake pdf".as_slice()),
        ],
    ))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
