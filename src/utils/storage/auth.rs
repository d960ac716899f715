//! Sign-in facility of the cloud store and the one-shot retry decorator built on it.
use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::StorageError;

/// The signed-in cloud account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudUser {
    pub username: String,
}

/// Authentication facility of the cloud store.
#[async_trait]
pub trait CloudAuth: Send + Sync {
    /// Run the interactive sign-in flow.
    async fn sign_in(&self) -> Result<(), StorageError>;

    fn is_signed_in(&self) -> bool;

    async fn get_user(&self) -> Result<CloudUser, StorageError>;
}

/// Decides whether a failure is an expired login worth one sign-in and retry.
pub type AuthExpiredPredicate = fn(&StorageError) -> bool;

/// Bounded-retry decorator for cloud operations.
///
/// Runs the operation; if it fails with an auth-expired error, runs the
/// sign-in flow once and re-runs the operation once. Every other outcome is
/// returned as is. There is never a second retry.
#[derive(Clone)]
pub struct AuthRetry {
    auth: Arc<dyn CloudAuth>,
    is_auth_expired: AuthExpiredPredicate,
}

impl AuthRetry {
    pub fn new(auth: Arc<dyn CloudAuth>) -> Self {
        Self {
            auth,
            is_auth_expired: StorageError::is_auth_expired,
        }
    }

    /// Replace the default auth-expired predicate.
    pub fn with_predicate(mut self, predicate: AuthExpiredPredicate) -> Self {
        self.is_auth_expired = predicate;
        self
    }

    pub fn auth(&self) -> &Arc<dyn CloudAuth> {
        &self.auth
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        match op().await {
            Ok(value) => Ok(value),
            Err(err) if (self.is_auth_expired)(&err) => {
                tracing::info!(error = %err, "cloud credentials expired, signing in again");
                self.auth.sign_in().await?;
                op().await
            }
            Err(err) => Err(err),
        }
    }
}
