use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use registration::config::DatabaseConfig;
use registration::mongo::MongoUserRepository;
use registration::{
    FileType, MemoryUserRepository, NewUser, RepositoryError, StoredUser, UserRepository,
};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) users: Arc<UserStore>,
}

/// Repository selected at startup: MongoDB when a URI is configured, memory otherwise.
#[derive(Debug)]
pub(crate) enum UserStore {
    Mongo(MongoUserRepository),
    Memory(MemoryUserRepository),
}

impl UserStore {
    pub(crate) async fn from_config(config: &DatabaseConfig) -> Self {
        match &config.uri {
            Some(uri) => {
                let repository = MongoUserRepository::new(uri.clone(), config.name.clone());
                if repository.connect().await.is_err() {
                    warn!("starting without a database connection; retrying on first request");
                }
                Self::Mongo(repository)
            }
            None => {
                warn!("MONGODB_URI not set; registrations are kept in memory");
                Self::Memory(MemoryUserRepository::default())
            }
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        match self {
            Self::Mongo(repository) => repository.is_connected(),
            Self::Memory(_) => true,
        }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, RepositoryError> {
        match self {
            Self::Mongo(repository) => repository.find_by_email(email).await,
            Self::Memory(repository) => repository.find_by_email(email).await,
        }
    }

    async fn create(&self, user: NewUser) -> Result<StoredUser, RepositoryError> {
        match self {
            Self::Mongo(repository) => repository.create(user).await,
            Self::Memory(repository) => repository.create(user).await,
        }
    }
}

/// A `--document` argument: `LABEL:TYPE:PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DocumentArg {
    pub(crate) label: String,
    pub(crate) file_type: FileType,
    pub(crate) path: PathBuf,
}

pub(crate) fn parse_document_arg(raw: &str) -> Result<DocumentArg, String> {
    let mut parts = raw.splitn(3, ':');
    let (Some(label), Some(kind), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected LABEL:TYPE:PATH, got '{raw}'"));
    };

    let label = label.trim();
    if label.is_empty() {
        return Err(format!("document label is empty in '{raw}'"));
    }
    let path = path.trim();
    if path.is_empty() {
        return Err(format!("document path is empty in '{raw}'"));
    }

    Ok(DocumentArg {
        label: label.to_string(),
        file_type: kind.parse()?,
        path: PathBuf::from(path),
    })
}
