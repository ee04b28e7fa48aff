use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Declared kind of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Pdf,
}

impl FileType {
    pub fn label(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Pdf => "pdf",
        }
    }

    /// Whether a payload with this name and content type fits the declared kind.
    /// Either the MIME type or the extension is enough.
    pub fn accepts(&self, file_name: &str, content_type: &str) -> bool {
        let content_type = content_type.trim();
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match self {
            FileType::Image => {
                content_type.to_ascii_lowercase().starts_with("image/")
                    || extension
                        .as_deref()
                        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
            }
            FileType::Pdf => {
                content_type.eq_ignore_ascii_case("application/pdf")
                    || extension.as_deref() == Some("pdf")
            }
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(FileType::Image),
            "pdf" => Ok(FileType::Pdf),
            other => Err(format!("unknown file type '{other}' (expected image or pdf)")),
        }
    }
}

/// Two-line street address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street1: String,
    pub street2: String,
}

/// Label and declared type of one document, as sent in the `data` form field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentMetadata {
    pub file_name: String,
    pub file_type: Option<FileType>,
}

/// JSON metadata of a registration. File payloads travel as separate parts.
///
/// Every field defaults so that an incomplete payload reaches the validation
/// schema and is reported field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dob: String,
    pub residential: Address,
    pub permanent: Address,
    pub same_as_residential: bool,
    pub documents: Vec<DocumentMetadata>,
}

impl RegistrationDetails {
    /// Copies the residential address over the permanent one when the flag is set.
    pub fn mirror_residential(&mut self) {
        if self.same_as_residential {
            self.permanent = self.residential.clone();
        }
    }
}

/// A document once its payload has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub file_name: String,
    pub file_type: FileType,
    pub file_url: String,
}

/// User record handed to the repository for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dob: String,
    pub residential: Address,
    pub permanent: Address,
    pub same_as_residential: bool,
    pub documents: Vec<DocumentRecord>,
}

/// Persisted user with identity and timestamps assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub id: String,
    #[serde(flatten)]
    pub user: NewUser,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// File picked on the client side, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileAttachment {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Builds an attachment whose content type is guessed from the file name.
    pub fn guessed(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let content_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self::new(name, content_type, bytes)
    }
}

/// One row of the registration form's document list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDraft {
    pub file_name: String,
    pub file_type: FileType,
    pub file: Option<FileAttachment>,
}

impl Default for DocumentDraft {
    fn default() -> Self {
        Self {
            file_name: String::new(),
            file_type: FileType::Image,
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_accepts_mime_or_extension() {
        assert!(FileType::Pdf.accepts("scan.bin", "application/pdf"));
        assert!(FileType::Pdf.accepts("Proof.PDF", "application/octet-stream"));
        assert!(!FileType::Pdf.accepts("proof.png", "image/png"));
        assert!(!FileType::Pdf.accepts("proof", ""));
    }

    #[test]
    fn image_accepts_mime_or_extension() {
        assert!(FileType::Image.accepts("avatar", "image/heic"));
        assert!(FileType::Image.accepts("id.JPEG", ""));
        assert!(FileType::Image.accepts("id.webp", "application/octet-stream"));
        assert!(!FileType::Image.accepts("id.pdf", "application/pdf"));
    }

    #[test]
    fn details_tolerate_missing_fields() {
        let details: RegistrationDetails =
            serde_json::from_str(r#"{"email":"ann@x.com","sameAsResidential":true}"#)
                .expect("partial payload parses");
        assert_eq!(details.email, "ann@x.com");
        assert!(details.same_as_residential);
        assert!(details.documents.is_empty());
        assert_eq!(details.permanent, Address::default());
    }

    #[test]
    fn stored_user_serializes_camel_case_and_flat() {
        let stored = StoredUser {
            id: "user-000001".to_string(),
            user: NewUser {
                first_name: "Ann".to_string(),
                last_name: "Lee".to_string(),
                email: "ann@x.com".to_string(),
                dob: "2000-01-01".to_string(),
                residential: Address::default(),
                permanent: Address::default(),
                same_as_residential: true,
                documents: vec![DocumentRecord {
                    file_name: "id".to_string(),
                    file_type: FileType::Image,
                    file_url: "/uploads/1-id.png".to_string(),
                }],
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&stored).expect("serializes");
        assert_eq!(value["firstName"], "Ann");
        assert_eq!(value["sameAsResidential"], true);
        assert_eq!(value["documents"][0]["fileType"], "image");
        assert_eq!(value["documents"][0]["fileUrl"], "/uploads/1-id.png");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("user").is_none());
    }

    #[test]
    fn guessed_attachment_uses_extension() {
        let attachment = FileAttachment::guessed("proof.pdf", vec![1_u8, 2, 3]);
        assert_eq!(attachment.content_type, "application/pdf");
    }
}
