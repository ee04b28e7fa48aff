use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::domain::{Address, DocumentRecord, NewUser, StoredUser};
use crate::repository::{RepositoryError, UserRepository};

const USERS_COLLECTION: &str = "users";
const DUPLICATE_KEY_CODE: i32 = 11000;

// Storage model, kept apart from the domain entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    first_name: String,
    last_name: String,
    email: String,
    dob: String,
    residential: Address,
    permanent: Address,
    same_as_residential: bool,
    documents: Vec<DocumentRecord>,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

impl UserDocument {
    fn from_new(user: NewUser, now: BsonDateTime) -> Self {
        Self {
            id: None,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            dob: user.dob,
            residential: user.residential,
            permanent: user.permanent,
            same_as_residential: user.same_as_residential,
            documents: user.documents,
            created_at: now,
            updated_at: now,
        }
    }
}

fn to_chrono(value: BsonDateTime) -> chrono::DateTime<Utc> {
    chrono::DateTime::<Utc>::from_timestamp_millis(value.timestamp_millis()).unwrap_or_default()
}

impl From<UserDocument> for StoredUser {
    fn from(document: UserDocument) -> Self {
        StoredUser {
            id: document.id.map(|id| id.to_hex()).unwrap_or_default(),
            user: NewUser {
                first_name: document.first_name,
                last_name: document.last_name,
                email: document.email,
                dob: document.dob,
                residential: document.residential,
                permanent: document.permanent,
                same_as_residential: document.same_as_residential,
                documents: document.documents,
            },
            created_at: to_chrono(document.created_at),
            updated_at: to_chrono(document.updated_at),
        }
    }
}

/// MongoDB-backed user repository.
///
/// The connection is opened on first use and shared afterwards. Concurrent
/// first callers wait on the same initialisation; a failed attempt is logged
/// and retried by the next caller.
pub struct MongoUserRepository {
    uri: String,
    database: String,
    users: OnceCell<Collection<UserDocument>>,
}

impl MongoUserRepository {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            users: OnceCell::new(),
        }
    }

    /// Opens the connection if it is not open yet. Later calls are no-ops.
    pub async fn connect(&self) -> Result<(), RepositoryError> {
        self.collection().await.map(|_| ())
    }

    pub fn is_connected(&self) -> bool {
        self.users.initialized()
    }

    async fn collection(&self) -> Result<&Collection<UserDocument>, RepositoryError> {
        self.users
            .get_or_try_init(|| async {
                match self.open().await {
                    Ok(users) => {
                        info!(database = %self.database, "mongodb connected");
                        Ok(users)
                    }
                    Err(err) => {
                        error!(database = %self.database, error = %err, "mongodb connection error");
                        Err(err)
                    }
                }
            })
            .await
    }

    async fn open(&self) -> Result<Collection<UserDocument>, RepositoryError> {
        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(unavailable)?;
        let database = client.database(&self.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(unavailable)?;

        let users = database.collection::<UserDocument>(USERS_COLLECTION);
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        users.create_index(unique_email).await.map_err(unavailable)?;

        Ok(users)
    }
}

impl std::fmt::Debug for MongoUserRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoUserRepository")
            .field("database", &self.database)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

fn unavailable(err: mongodb::error::Error) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, RepositoryError> {
        let users = self.collection().await?;
        let found = users
            .find_one(doc! { "email": email })
            .await
            .map_err(|err| RepositoryError::Backend(err.to_string()))?;
        Ok(found.map(StoredUser::from))
    }

    async fn create(&self, user: NewUser) -> Result<StoredUser, RepositoryError> {
        let users = self.collection().await?;
        let mut document = UserDocument::from_new(user, BsonDateTime::now());

        let inserted = users.insert_one(&document).await.map_err(|err| {
            if is_duplicate_key(&err) {
                RepositoryError::Conflict
            } else {
                RepositoryError::Backend(err.to_string())
            }
        })?;

        document.id = inserted.inserted_id.as_object_id();
        Ok(StoredUser::from(document))
    }
}
