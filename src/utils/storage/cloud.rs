//! Path-addressed cloud file store, and its adapter over the `object_store` crate.
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{ObjectStore, ObjectStoreExt, path::Path as ObjectPath};
use tokio::sync::RwLock;

use super::StorageError;

/// A file written to the cloud store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudFile {
    /// The path the store reports for the written file.
    pub path: String,
}

/// Path-addressed file operations of the cloud store.
///
/// Paths are plain strings such as `~/anchorchat-memory/index.json`.
#[async_trait]
pub trait CloudFs: Send + Sync {
    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;

    async fn write(&self, path: &str, data: Bytes) -> Result<CloudFile, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), StorageError>;
}

/// Join a root path and a child name with exactly one separator.
pub fn join_path(root: &str, name: &str) -> String {
    let root = root.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if root.is_empty() {
        name.to_string()
    } else {
        format!("{root}/{name}")
    }
}

/// Cloud store backed by any [`ObjectStore`] (S3, R2, local disk, in-memory).
///
/// Object storage has no directories, so `mkdir` only validates the path.
/// The inner store can be swapped after a fresh sign-in.
pub struct ObjectStoreFs {
    inner: RwLock<Arc<dyn ObjectStore>>,
}

impl ObjectStoreFs {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Replace the underlying store, e.g. after new credentials were entered.
    pub async fn replace_store(&self, inner: Arc<dyn ObjectStore>) {
        *self.inner.write().await = inner;
    }

    async fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&*self.inner.read().await)
    }

    /// Map `~/a/b`, `/a/b` and `a/b` to the object key `a/b`.
    fn object_path(path: &str) -> Result<ObjectPath, StorageError> {
        let key = path.trim_start_matches("~/").trim_start_matches('/');
        if key.is_empty() || key == "~" {
            return Err(StorageError::InvalidName(path.to_string()));
        }
        ObjectPath::parse(key).map_err(|e| StorageError::InvalidName(format!("{path}: {e}")))
    }

    /// Display form of an object key, in the home-relative scheme callers use.
    fn display_path(path: &ObjectPath) -> String {
        format!("~/{path}")
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            object_store::Error::Unauthenticated { path, source } => {
                StorageError::AuthExpired(format!("{path}: {source}"))
            }
            object_store::Error::PermissionDenied { path, source } => {
                StorageError::PermissionDenied(format!("{path}: {source}"))
            }
            other => StorageError::Remote {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl CloudFs for ObjectStoreFs {
    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let location = Self::object_path(path)?;
        let store = self.store().await;
        let result = store.get(&location).await?;
        Ok(result.bytes().await?)
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<CloudFile, StorageError> {
        let location = Self::object_path(path)?;
        let store = self.store().await;
        store.put(&location, data.into()).await?;
        Ok(CloudFile {
            path: Self::display_path(&location),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let location = Self::object_path(path)?;
        let store = self.store().await;
        match store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn mkdir(&self, path: &str, _recursive: bool) -> Result<(), StorageError> {
        Self::object_path(path).map(|_| ())
    }
}
