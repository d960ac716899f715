//! Storage backends for chat documents.
//!
//! Both variants expose the same small contract ([`StorageBackend`]) over flat
//! document names such as `index.json` or `<session-id>.json`:
//!
//! - [`local::LocalStorage`] works through a revocable directory capability
//!   granted by the user.
//! - [`remote::CloudStorage`] works through path strings on a cloud store and
//!   recovers from expired credentials with [`auth::AuthRetry`].
//!
//! Callers pick a variant once, when the [`StorageContext`] is built, and never
//! branch on the mode afterwards.
pub mod auth;
pub mod cloud;
pub mod local;
pub mod remote;
pub mod signin;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the session index document.
pub const INDEX_FILE: &str = "index.json";
/// Name of the settings document.
pub const SETTINGS_FILE: &str = "settings.json";

/// Errors raised by storage backends and the collaborators underneath them.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The root location could not be created or accessed.
    #[error("storage initialization failed: {0}")]
    Initialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials for the cloud store are missing or expired.
    #[error("unauthorized: {0}")]
    AuthExpired(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The directory capability was revoked by the user.
    #[error("directory access has been revoked")]
    Revoked,

    #[error("invalid entry name: {0}")]
    InvalidName(String),

    /// A remote call failed. `status` carries the HTTP status when known.
    #[error("remote store error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Remote {
        status: Option<u16>,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether this failure signals an expired or missing login.
    ///
    /// Recognizes the dedicated variant, a 401 status, and any message that
    /// mentions "unauthorized" (case-insensitive).
    pub fn is_auth_expired(&self) -> bool {
        match self {
            StorageError::AuthExpired(_) => true,
            StorageError::Remote { status: Some(401), .. } => true,
            other => other.to_string().to_lowercase().contains("unauthorized"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Which backend a [`StorageContext`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Local,
    Cloud,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Local => write!(f, "local"),
            StorageMode::Cloud => write!(f, "cloud"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageMode::Local),
            "cloud" => Ok(StorageMode::Cloud),
            other => Err(format!("unknown storage mode: '{other}'")),
        }
    }
}

/// Uniform document storage contract shared by the local and cloud variants.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create the working location and an empty index if they are missing.
    /// Safe to call repeatedly.
    async fn ensure_root(&self) -> Result<(), StorageError>;

    /// Read a document. A missing document is `Ok(None)`, not an error.
    async fn read_text(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Create or fully replace a document.
    async fn write_text(&self, name: &str, text: &str) -> Result<(), StorageError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete_entry(&self, name: &str) -> Result<(), StorageError>;

    fn mode(&self) -> StorageMode;
}

/// The storage selected for one application instance.
///
/// Switching modes means building a new context; nothing is migrated.
#[derive(Clone)]
pub struct StorageContext {
    backend: Arc<dyn StorageBackend>,
}

impl StorageContext {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn mode(&self) -> StorageMode {
        self.backend.mode()
    }

    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.backend)
    }

    /// Prepare the root location, reporting any failure as
    /// [`StorageError::Initialization`].
    pub async fn initialize(&self) -> Result<(), StorageError> {
        match self.backend.ensure_root().await {
            Ok(()) => {
                tracing::debug!(mode = %self.mode(), "storage initialized");
                Ok(())
            }
            Err(StorageError::Initialization(msg)) => Err(StorageError::Initialization(msg)),
            Err(e) => Err(StorageError::Initialization(e.to_string())),
        }
    }
}

impl fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageContext")
            .field("mode", &self.mode())
            .finish()
    }
}
