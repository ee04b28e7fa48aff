use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{NewUser, StoredUser};

/// Storage abstraction so the registration service can be exercised in isolation.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, RepositoryError>;
    async fn create(&self, user: NewUser) -> Result<StoredUser, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("repository operation failed: {0}")]
    Backend(String),
}

/// Process-local user store keyed by email.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserRepository {
    users: Arc<Mutex<HashMap<String, StoredUser>>>,
    sequence: Arc<AtomicU64>,
}

impl MemoryUserRepository {
    pub fn users(&self) -> Result<Vec<StoredUser>, RepositoryError> {
        let guard = self.users.lock().map_err(poisoned)?;
        let mut users: Vec<StoredUser> = guard.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    fn next_id(&self) -> String {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("user-{id:06}")
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("user store lock poisoned".to_string())
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, RepositoryError> {
        let guard = self.users.lock().map_err(poisoned)?;
        Ok(guard.get(email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<StoredUser, RepositoryError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        if guard.contains_key(&user.email) {
            return Err(RepositoryError::Conflict);
        }

        let now = Utc::now();
        let stored = StoredUser {
            id: self.next_id(),
            user,
            created_at: now,
            updated_at: now,
        };
        guard.insert(stored.user.email.clone(), stored.clone());
        Ok(stored)
    }
}
