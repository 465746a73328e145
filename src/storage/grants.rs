//! Route grants: which principal may call which `METHOD /route/template`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::storage::StoreError;

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// `route` is a method plus a normalized template, e.g. `GET /users/:id`.
    async fn has_grant(&self, principal_id: i64, route: &str) -> Result<bool, StoreError>;
}

/// Process-local [`GrantStore`].
#[derive(Clone, Default)]
pub struct InMemoryGrantStore {
    grants: Arc<DashMap<i64, HashSet<String>>>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, principal_id: i64, route: impl Into<String>) {
        self.grants.entry(principal_id).or_default().insert(route.into());
    }

    pub fn revoke(&self, principal_id: i64, route: &str) {
        if let Some(mut routes) = self.grants.get_mut(&principal_id) {
            routes.remove(route);
        }
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn has_grant(&self, principal_id: i64, route: &str) -> Result<bool, StoreError> {
        Ok(self
            .grants
            .get(&principal_id)
            .map(|routes| routes.contains(route))
            .unwrap_or(false))
    }
}
