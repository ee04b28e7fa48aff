//! User registration with document uploads.
//!
//! The crate covers the whole registration flow: the validation schema shared by
//! the form client and the server, the file storage adapter (local disk plus an
//! optional remote object store), the user repository, and the HTTP router that
//! ties them together behind `POST /api/register`.

pub mod client;
pub mod config;
pub mod domain;
pub mod drive;
pub mod error;
pub mod mongo;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod validation;

#[cfg(test)]
mod tests;

pub use client::{FileTypeMismatch, Notice, NoticeKind, RegistrationClient, RegistrationForm};
pub use domain::{
    Address, DocumentDraft, DocumentMetadata, DocumentRecord, FileAttachment, FileType, NewUser,
    RegistrationDetails, StoredUser,
};
pub use repository::{MemoryUserRepository, RepositoryError, UserRepository};
pub use router::registration_router;
pub use service::{RegistrationError, RegistrationService, RegistrationSubmission};
pub use storage::{FileStorage, StorageError, UploadedFile};
pub use validation::{FieldError, ValidationErrors};
