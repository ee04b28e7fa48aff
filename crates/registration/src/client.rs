//! Registration form state and the HTTP client that submits it.
//!
//! The form mirrors the residential address into the permanent one while the
//! "same as residential" flag is on, checks every attached file against its
//! declared type, and posts the result as multipart form data.

use std::fmt;

use chrono::{Local, NaiveDate};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::warn;

use crate::domain::{
    Address, DocumentDraft, DocumentMetadata, FileAttachment, FileType, RegistrationDetails,
};
use crate::router::REGISTER_PATH;
use crate::validation::{self, ValidationErrors};

pub const SUCCESS_MESSAGE: &str = "User registered!";
pub const REJECTED_MESSAGE: &str = "Registration failed!";
pub const FALLBACK_MESSAGE: &str = "Something went wrong";

/// Client-side registration form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dob: String,
    residential: Address,
    permanent: Address,
    same_as_residential: bool,
    documents: Vec<DocumentDraft>,
}

impl Default for RegistrationForm {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            dob: String::new(),
            residential: Address::default(),
            permanent: Address::default(),
            same_as_residential: false,
            documents: vec![DocumentDraft::default(), DocumentDraft::default()],
        }
    }
}

impl RegistrationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn residential(&self) -> &Address {
        &self.residential
    }

    pub fn permanent(&self) -> &Address {
        &self.permanent
    }

    pub fn same_as_residential(&self) -> bool {
        self.same_as_residential
    }

    pub fn set_same_as_residential(&mut self, enabled: bool) {
        self.same_as_residential = enabled;
        self.sync_permanent();
    }

    pub fn set_residential_street1(&mut self, value: impl Into<String>) {
        self.residential.street1 = value.into();
        self.sync_permanent();
    }

    pub fn set_residential_street2(&mut self, value: impl Into<String>) {
        self.residential.street2 = value.into();
        self.sync_permanent();
    }

    /// Has no lasting effect while the permanent address mirrors the residential one.
    pub fn set_permanent_street1(&mut self, value: impl Into<String>) {
        self.permanent.street1 = value.into();
        self.sync_permanent();
    }

    /// Has no lasting effect while the permanent address mirrors the residential one.
    pub fn set_permanent_street2(&mut self, value: impl Into<String>) {
        self.permanent.street2 = value.into();
        self.sync_permanent();
    }

    fn sync_permanent(&mut self) {
        if self.same_as_residential {
            self.permanent = self.residential.clone();
        }
    }

    pub fn documents(&self) -> &[DocumentDraft] {
        &self.documents
    }

    pub fn document_mut(&mut self, index: usize) -> Option<&mut DocumentDraft> {
        self.documents.get_mut(index)
    }

    /// Appends an empty image document and returns its index.
    pub fn add_document(&mut self) -> usize {
        self.documents.push(DocumentDraft::default());
        self.documents.len() - 1
    }

    pub fn remove_document(&mut self, index: usize) -> Option<DocumentDraft> {
        if index < self.documents.len() {
            Some(self.documents.remove(index))
        } else {
            None
        }
    }

    /// Attaches `file` to document `index`; returns false when there is no such row.
    pub fn attach(&mut self, index: usize, file: FileAttachment) -> bool {
        match self.documents.get_mut(index) {
            Some(document) => {
                document.file = Some(file);
                true
            }
            None => false,
        }
    }

    /// Metadata sent in the `data` field. File payloads are not included.
    pub fn details(&self) -> RegistrationDetails {
        RegistrationDetails {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            dob: self.dob.clone(),
            residential: self.residential.clone(),
            permanent: self.permanent.clone(),
            same_as_residential: self.same_as_residential,
            documents: self
                .documents
                .iter()
                .map(|document| DocumentMetadata {
                    file_name: document.file_name.clone(),
                    file_type: Some(document.file_type),
                })
                .collect(),
        }
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let attachments: Vec<bool> = self
            .documents
            .iter()
            .map(|document| document.file.is_some())
            .collect();
        validation::validate(&self.details(), &attachments, today)
    }

    /// Checks each attached file against its declared type, stopping at the first mismatch.
    pub fn check_file_types(&self) -> Result<(), FileTypeMismatch> {
        for document in &self.documents {
            let Some(file) = &document.file else {
                continue;
            };
            if !document.file_type.accepts(&file.name, &file.content_type) {
                return Err(FileTypeMismatch {
                    document: document.file_name.clone(),
                    expected: document.file_type,
                });
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// An attached file does not match the document's declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypeMismatch {
    pub document: String,
    pub expected: FileType,
}

impl fmt::Display for FileTypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wanted = match self.expected {
            FileType::Image => "an IMAGE file",
            FileType::Pdf => "a PDF file",
        };
        write!(
            f,
            "Invalid file type for {}. Please upload {wanted}.",
            self.document
        )
    }
}

impl std::error::Error for FileTypeMismatch {}

/// Errors that stop a submission before anything is sent.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    FileType(#[from] FileTypeMismatch),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("failed to encode registration data: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid content type '{content_type}' for {file}: {source}")]
    ContentType {
        file: String,
        content_type: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient message shown to the user after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NoticeKind::Success
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Posts registration forms to a running server.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RegistrationClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}{REGISTER_PATH}", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Validates and submits `form`, resetting it after a successful registration.
    ///
    /// Rule violations return `Err` and nothing is sent. Once the request is
    /// sent, every outcome is reported as a `Notice`; there is no retry.
    pub async fn submit(&self, form: &mut RegistrationForm) -> Result<Notice, ClientError> {
        self.submit_on(form, Local::now().date_naive()).await
    }

    pub async fn submit_on(
        &self,
        form: &mut RegistrationForm,
        today: NaiveDate,
    ) -> Result<Notice, ClientError> {
        form.validate(today)?;
        form.check_file_types()?;
        let body = multipart_payload(form)?;

        let response = match self.http.post(&self.endpoint).multipart(body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(endpoint = %self.endpoint, error = %err, "registration request failed");
                return Ok(Notice::error(FALLBACK_MESSAGE));
            }
        };

        let status = response.status();
        let payload = response.json::<ApiResponse>().await.ok();

        if status.is_success() {
            if payload.is_some_and(|body| body.success) {
                form.reset();
                Ok(Notice::success(SUCCESS_MESSAGE))
            } else {
                Ok(Notice::error(REJECTED_MESSAGE))
            }
        } else {
            let message = payload
                .and_then(|body| body.message)
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
            Ok(Notice::error(message))
        }
    }
}

/// `data` JSON field followed by one `files` part per attached document, in order.
pub fn multipart_payload(form: &RegistrationForm) -> Result<Form, ClientError> {
    let data = serde_json::to_string(&form.details())?;
    let mut payload = Form::new().text("data", data);

    for document in form.documents() {
        let Some(file) = &document.file else {
            continue;
        };
        let content_type = if file.content_type.trim().is_empty() {
            mime_guess::from_path(&file.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        } else {
            file.content_type.clone()
        };
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&content_type)
            .map_err(|source| ClientError::ContentType {
                file: file.name.clone(),
                content_type: content_type.clone(),
                source,
            })?;
        payload = payload.part("files", part);
    }

    Ok(payload)
}
