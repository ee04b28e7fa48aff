use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::drive::{ObjectStore, ObjectStoreError, RemoteObject};

/// File part received with a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Remote(#[from] ObjectStoreError),
}

/// Writes uploads under a public root and optionally forwards them to a remote store.
#[derive(Debug, Clone)]
pub struct FileStorage {
    public_root: PathBuf,
    remote: Option<Arc<dyn ObjectStore>>,
    keep_local_copy: bool,
}

impl FileStorage {
    pub fn local(public_root: impl Into<PathBuf>) -> Self {
        Self {
            public_root: public_root.into(),
            remote: None,
            keep_local_copy: false,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn ObjectStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Keep the local file after a successful remote upload.
    pub fn keep_local_copy(mut self, keep: bool) -> Self {
        self.keep_local_copy = keep;
        self
    }

    /// Stores `file` under `folder` and returns the URL clients should use.
    ///
    /// Without a remote store the URL is the path relative to the public root.
    /// With one, the local copy is uploaded and then removed, and the remote URL
    /// is returned. A failed upload leaves the local copy behind.
    pub async fn store(&self, file: &UploadedFile, folder: &str) -> Result<String, StorageError> {
        let name = stored_name(&file.file_name, timestamp_nanos());
        let directory = self.public_root.join(folder);
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| StorageError::Write {
                path: directory.clone(),
                source,
            })?;

        let path = directory.join(&name);
        write_new(&path, &file.bytes).await?;
        debug!(path = %path.display(), bytes = file.bytes.len(), "stored upload locally");

        let Some(remote) = &self.remote else {
            return Ok(format!("/{folder}/{name}"));
        };

        let content_type = match &file.content_type {
            Some(content_type) if !content_type.trim().is_empty() => content_type.clone(),
            _ => mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        let url = remote
            .upload(RemoteObject {
                local_path: &path,
                name: &name,
                content_type: &content_type,
            })
            .await?;
        debug!(%url, "uploaded document to object store");

        if !self.keep_local_copy {
            if let Err(err) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %err, "failed to remove local upload copy");
            }
        }

        Ok(url)
    }
}

// Never replaces an existing upload; a name collision is a write error.
async fn write_new(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let write_error = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut target = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(write_error)?;
    target.write_all(bytes).await.map_err(write_error)?;
    target.flush().await.map_err(write_error)
}

fn timestamp_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros())
}

/// `{timestamp}-{name}` with the name reduced to a safe final path component.
pub fn stored_name(original: &str, timestamp: i64) -> String {
    format!("{timestamp}-{}", sanitize_file_name(original))
}

fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(|ch: char| ch == '/' || ch == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
