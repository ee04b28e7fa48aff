use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use google_drive3::api::{File as DriveFile, Scope};
use google_drive3::hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use google_drive3::hyper_util::client::legacy::connect::HttpConnector;
use google_drive3::hyper_util::client::legacy::Client;
use google_drive3::hyper_util::rt::TokioExecutor;
use google_drive3::{yup_oauth2, DriveHub};

/// Local file about to be copied to a remote object store.
#[derive(Debug, Clone, Copy)]
pub struct RemoteObject<'a> {
    pub local_path: &'a Path,
    pub name: &'a str,
    pub content_type: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object store operation failed: {0}")]
    Backend(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Remote provider that durably hosts uploaded files and hands back a URL.
#[async_trait]
pub trait ObjectStore: Debug + Send + Sync {
    async fn upload(&self, object: RemoteObject<'_>) -> Result<String, ObjectStoreError>;
}

/// Object store backed by a Google Drive folder.
pub struct GoogleDriveStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
    folder_id: String,
}

impl<C> GoogleDriveStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>, folder_id: impl Into<String>) -> Self {
        Self {
            hub,
            folder_id: folder_id.into(),
        }
    }

    fn map_error<E: std::fmt::Display>(err: E) -> ObjectStoreError {
        ObjectStoreError::Backend(err.to_string())
    }
}

impl GoogleDriveStore<HttpsConnector<HttpConnector>> {
    /// Authenticates with a service account key file and targets `folder_id`.
    pub async fn from_service_account(
        key_path: &Path,
        folder_id: impl Into<String>,
    ) -> Result<Self, ObjectStoreError> {
        let key = yup_oauth2::read_service_account_key(key_path)
            .await
            .map_err(|source| ObjectStoreError::Read {
                path: key_path.to_path_buf(),
                source,
            })?;

        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|err| {
                ObjectStoreError::Unavailable(format!("drive authentication: {err}"))
            })?;

        let client = Client::builder(TokioExecutor::new()).build(https_connector()?);
        Ok(Self::new(DriveHub::new(client, auth), folder_id))
    }
}

// The upload API takes a blocking reader; the open itself runs on tokio's pool.
async fn open_local(path: &Path) -> Result<std::fs::File, ObjectStoreError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| ObjectStoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file.into_std().await)
}

fn https_connector() -> Result<HttpsConnector<HttpConnector>, ObjectStoreError> {
    let connector = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|err| ObjectStoreError::Unavailable(format!("tls roots: {err}")))?
        .https_or_http()
        .enable_http2()
        .build();
    Ok(connector)
}

impl<C> std::fmt::Debug for GoogleDriveStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveStore")
            .field("folder_id", &self.folder_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> ObjectStore for GoogleDriveStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    async fn upload(&self, object: RemoteObject<'_>) -> Result<String, ObjectStoreError> {
        let metadata = DriveFile {
            name: Some(object.name.to_string()),
            mime_type: Some(object.content_type.to_string()),
            parents: Some(vec![self.folder_id.clone()]),
            ..DriveFile::default()
        };

        let reader = open_local(object.local_path).await?;
        let media_type = object
            .content_type
            .parse::<mime::Mime>()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);

        let (_, file) = self
            .hub
            .files()
            .create(metadata)
            .param("fields", "id,webViewLink")
            .supports_all_drives(true)
            .add_scope(Scope::File)
            .upload(reader, media_type)
            .await
            .map_err(Self::map_error)?;

        file.web_view_link
            .or_else(|| {
                file.id
                    .map(|id| format!("https://drive.google.com/file/d/{id}/view"))
            })
            .ok_or_else(|| ObjectStoreError::Backend("drive returned no file id".to_string()))
    }
}
