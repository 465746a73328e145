//! Startup orchestration.
//!
//! Config is loaded and validated first, then collaborators are built and
//! seeded, and the listener is bound last so traffic only arrives when ready.

use std::sync::Arc;

use crate::api::PRIVATE_GRANTS;
use crate::config::BootstrapConfig;
use crate::security::PasswordHasher;
use crate::storage::{InMemoryGrantStore, NewUser, StoreError, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("failed to seed bootstrap account: {0}")]
    Bootstrap(#[from] StoreError),

    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Ensure the bootstrap account exists and holds every private grant.
///
/// Returns the account id. Re-running against a store that already holds the
/// account only refreshes its grants.
pub async fn seed_bootstrap(
    bootstrap: &BootstrapConfig,
    users: &Arc<dyn UserStore>,
    grants: &InMemoryGrantStore,
    passwords: &dyn PasswordHasher,
) -> Result<i64, StoreError> {
    let id = match users.find_by_email(&bootstrap.email).await? {
        Some(existing) => existing.id,
        None => {
            let user = users
                .create(
                    NewUser {
                        name: bootstrap.name.clone(),
                        email: bootstrap.email.clone(),
                        password_hash: passwords.hash(&bootstrap.password),
                    },
                    None,
                )
                .await?;
            tracing::info!(user_id = user.id, email = %user.email, "Bootstrap account created");
            user.id
        }
    };

    for route in PRIVATE_GRANTS {
        grants.grant(id, route);
    }
    Ok(id)
}
