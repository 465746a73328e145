//! Account persistence.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::storage::StoreError;

/// A stored account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<i64>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fields required to create an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Account store. Soft-deleted accounts are invisible to every lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// List accounts, optionally filtered by a case-insensitive name fragment.
    async fn list(&self, search: Option<&str>) -> Result<Vec<User>, StoreError>;

    /// Create an account. `actor` is the principal performing the creation,
    /// absent for bootstrap accounts.
    async fn create(&self, user: NewUser, actor: Option<i64>) -> Result<User, StoreError>;

    /// Rename an account. Returns `None` when it does not exist.
    async fn rename(&self, id: i64, name: &str, actor: i64) -> Result<Option<User>, StoreError>;

    /// Soft-delete an account. Returns `false` when it does not exist.
    async fn delete(&self, id: i64, actor: i64) -> Result<bool, StoreError>;
}

/// Process-local [`UserStore`].
#[derive(Clone)]
pub struct InMemoryUserStore {
    users: Arc<DashMap<i64, User>>,
    /// lowercased email -> id, for live accounts only
    emails: Arc<DashMap<String, i64>>,
    next_id: Arc<AtomicI64>,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            emails: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, id: i64) -> Option<User> {
        self.users
            .get(&id)
            .filter(|user| !user.is_deleted())
            .map(|user| user.value().clone())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.live(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let id = match self.emails.get(&email.to_lowercase()) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.live(id))
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<User>, StoreError> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|entry| !entry.is_deleted())
            .filter(|entry| match &needle {
                Some(needle) => entry.name.to_lowercase().contains(needle),
                None => true,
            })
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    async fn create(&self, user: NewUser, actor: Option<i64>) -> Result<User, StoreError> {
        let key = user.email.to_lowercase();
        let id = match self.emails.entry(key) {
            Entry::Occupied(_) => {
                return Err(StoreError::Conflict(format!(
                    "email {} is already registered",
                    user.email
                )))
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                vacant.insert(id);
                id
            }
        };

        let created = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
            created_by: actor,
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
        };
        self.users.insert(id, created.clone());
        Ok(created)
    }

    async fn rename(&self, id: i64, name: &str, actor: i64) -> Result<Option<User>, StoreError> {
        let mut user = match self.users.get_mut(&id) {
            Some(user) if !user.is_deleted() => user,
            _ => return Ok(None),
        };
        user.name = name.to_string();
        user.updated_at = Some(Utc::now());
        user.updated_by = Some(actor);
        Ok(Some(user.value().clone()))
    }

    async fn delete(&self, id: i64, actor: i64) -> Result<bool, StoreError> {
        let email = {
            let mut user = match self.users.get_mut(&id) {
                Some(user) if !user.is_deleted() => user,
                _ => return Ok(false),
            };
            user.deleted_at = Some(Utc::now());
            user.deleted_by = Some(actor);
            user.email.to_lowercase()
        };
        self.emails.remove_if(&email, |_, owner| *owner == id);
        Ok(true)
    }
}
