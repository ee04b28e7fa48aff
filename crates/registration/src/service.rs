use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::domain::{DocumentRecord, FileType, NewUser, RegistrationDetails, StoredUser};
use crate::repository::{RepositoryError, UserRepository};
use crate::storage::{FileStorage, StorageError, UploadedFile};
use crate::validation::{self, ValidationErrors};

pub const DEFAULT_UPLOADS_FOLDER: &str = "uploads";

/// Parsed registration request: JSON metadata plus file parts in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSubmission {
    pub details: RegistrationDetails,
    pub files: Vec<UploadedFile>,
}

/// Error raised by the registration service.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("email already registered")]
    Conflict,
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("data access failure: {0}")]
    DataAccess(RepositoryError),
}

impl From<RepositoryError> for RegistrationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => Self::Conflict,
            other => Self::DataAccess(other),
        }
    }
}

/// Service composing validation, the duplicate guard, file storage and the repository.
#[derive(Debug)]
pub struct RegistrationService<R> {
    repository: Arc<R>,
    storage: FileStorage,
    uploads_folder: String,
}

impl<R> RegistrationService<R>
where
    R: UserRepository + 'static,
{
    pub fn new(repository: Arc<R>, storage: FileStorage) -> Self {
        Self {
            repository,
            storage,
            uploads_folder: DEFAULT_UPLOADS_FOLDER.to_string(),
        }
    }

    pub fn with_uploads_folder(mut self, folder: impl Into<String>) -> Self {
        self.uploads_folder = folder.into();
        self
    }

    pub fn uploads_folder(&self) -> &str {
        &self.uploads_folder
    }

    /// Register a new user, validating against today's local date.
    pub async fn register(
        &self,
        submission: RegistrationSubmission,
    ) -> Result<StoredUser, RegistrationError> {
        self.register_on(submission, Local::now().date_naive())
            .await
    }

    /// Register a new user, validating the date of birth against `today`.
    ///
    /// No file is written before the duplicate-email check passes. Files stored
    /// before a later failure are left in place.
    pub async fn register_on(
        &self,
        submission: RegistrationSubmission,
        today: NaiveDate,
    ) -> Result<StoredUser, RegistrationError> {
        let RegistrationSubmission { mut details, files } = submission;
        details.email = details.email.trim().to_string();
        details.mirror_residential();

        if files.len() != details.documents.len() {
            return Err(RegistrationError::InvalidRequest(format!(
                "expected one file per document ({} documents, {} files)",
                details.documents.len(),
                files.len()
            )));
        }

        let attachments: Vec<bool> = files.iter().map(has_payload).collect();
        validation::validate(&details, &attachments, today)?;

        if self
            .repository
            .find_by_email(&details.email)
            .await?
            .is_some()
        {
            info!(email = %details.email, "rejected duplicate registration");
            return Err(RegistrationError::Conflict);
        }

        let mut pending: Vec<(String, FileType, &UploadedFile)> = Vec::with_capacity(files.len());
        for (metadata, file) in details.documents.iter().zip(&files) {
            let file_type = metadata.file_type.ok_or_else(|| {
                RegistrationError::InvalidRequest("document is missing its file type".to_string())
            })?;
            pending.push((metadata.file_name.trim().to_string(), file_type, file));
        }

        let mut documents = Vec::with_capacity(pending.len());
        for (file_name, file_type, file) in pending {
            let file_url = match self.storage.store(file, &self.uploads_folder).await {
                Ok(url) => url,
                Err(err) => {
                    if !documents.is_empty() {
                        warn!(
                            email = %details.email,
                            orphaned = documents.len(),
                            "storage failed after earlier documents were stored"
                        );
                    }
                    return Err(err.into());
                }
            };
            documents.push(DocumentRecord {
                file_name,
                file_type,
                file_url,
            });
        }

        let stored_documents = documents.len();
        let new_user = NewUser {
            first_name: details.first_name.trim().to_string(),
            last_name: details.last_name.trim().to_string(),
            email: details.email,
            dob: details.dob.trim().to_string(),
            residential: details.residential,
            permanent: details.permanent,
            same_as_residential: details.same_as_residential,
            documents,
        };

        let stored = self.repository.create(new_user).await.map_err(|err| {
            warn!(
                orphaned = stored_documents,
                error = %err,
                "user record not created; stored documents left in place"
            );
            RegistrationError::from(err)
        })?;

        info!(user_id = %stored.id, documents = stored_documents, "user registered");
        Ok(stored)
    }
}

// Browsers send an empty, unnamed part when no file was picked.
fn has_payload(file: &UploadedFile) -> bool {
    !(file.file_name.is_empty() && file.bytes.is_empty())
}
