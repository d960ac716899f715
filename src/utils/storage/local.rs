//! Local storage backend built on a user-granted directory capability.
//!
//! The capability is an opaque handle to one directory. It can hand out
//! handles to child directories, read, write and remove files by name, and it
//! can be revoked: once the [`DirectoryGrant`] is revoked, every handle derived
//! from it fails with [`StorageError::Revoked`].
//!
//! [`LocalStorage`] never caches the working subdirectory; each operation asks
//! the root capability for it again.
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use super::{INDEX_FILE, StorageBackend, StorageError, StorageMode};

/// Name of the subdirectory created inside the granted directory.
pub const WORKING_DIR_NAME: &str = "anchorchat chats";

/// Handle to a directory the user granted access to.
#[async_trait]
pub trait DirectoryCapability: Send + Sync {
    async fn get_or_create_subdirectory(
        &self,
        name: &str,
    ) -> Result<Arc<dyn DirectoryCapability>, StorageError>;

    /// Read a file. A missing file is `Ok(None)`.
    async fn read_file(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create or replace a file. Readers never see a partially written file.
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Remove a file. Removing a missing file succeeds.
    async fn remove_entry(&self, name: &str) -> Result<(), StorageError>;
}

/// Revocation switch shared by every handle derived from one grant.
#[derive(Debug, Default)]
struct GrantState {
    revoked: AtomicBool,
}

/// A user grant of one directory on the local filesystem.
///
/// The grant lives only as long as the process; nothing about it is persisted.
#[derive(Debug, Clone)]
pub struct DirectoryGrant {
    root: PathBuf,
    state: Arc<GrantState>,
}

impl DirectoryGrant {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Arc::new(GrantState::default()),
        }
    }

    /// The capability for the granted directory itself.
    pub fn capability(&self) -> Arc<dyn DirectoryCapability> {
        Arc::new(FsDirectory {
            path: self.root.clone(),
            state: Arc::clone(&self.state),
        })
    }

    /// Withdraw access; all handles derived from this grant stop working.
    pub fn revoke(&self) {
        self.state.revoked.store(true, Ordering::SeqCst);
    }

    pub fn is_revoked(&self) -> bool {
        self.state.revoked.load(Ordering::SeqCst)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// [`DirectoryCapability`] over a real directory.
struct FsDirectory {
    path: PathBuf,
    state: Arc<GrantState>,
}

impl FsDirectory {
    fn check(&self) -> Result<(), StorageError> {
        if self.state.revoked.load(Ordering::SeqCst) {
            return Err(StorageError::Revoked);
        }
        Ok(())
    }

    /// Resolve a child entry, refusing anything that could leave this directory.
    fn entry(&self, name: &str) -> Result<PathBuf, StorageError> {
        self.check()?;
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.path.join(name))
    }
}

fn map_io(err: std::io::Error, what: &Path) -> StorageError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => {
            StorageError::PermissionDenied(what.display().to_string())
        }
        std::io::ErrorKind::NotFound => StorageError::NotFound(what.display().to_string()),
        _ => StorageError::Io(err),
    }
}

#[async_trait]
impl DirectoryCapability for FsDirectory {
    async fn get_or_create_subdirectory(
        &self,
        name: &str,
    ) -> Result<Arc<dyn DirectoryCapability>, StorageError> {
        let path = self.entry(name)?;
        // only the child is created; a missing parent is an error
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    format!("'{}' is not a directory", self.path.display()),
                )));
            }
            Err(e) => return Err(map_io(e, &self.path)),
        }
        match tokio::fs::create_dir(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(map_io(e, &path)),
        }
        Ok(Arc::new(FsDirectory {
            path,
            state: Arc::clone(&self.state),
        }))
    }

    async fn read_file(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.entry(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io(e, &path)),
        }
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.entry(name)?;
        // Write beside the target and rename over it so the swap is atomic.
        let staging = self
            .path
            .join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&staging, data).await {
            return Err(map_io(e, &staging));
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(map_io(e, &path));
        }
        Ok(())
    }

    async fn remove_entry(&self, name: &str) -> Result<(), StorageError> {
        let path = self.entry(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(e, &path)),
        }
    }
}

/// Local backend: documents live in [`WORKING_DIR_NAME`] under the granted root.
pub struct LocalStorage {
    root: Arc<dyn DirectoryCapability>,
}

impl LocalStorage {
    pub fn new(root: Arc<dyn DirectoryCapability>) -> Self {
        Self { root }
    }

    async fn working_dir(&self) -> Result<Arc<dyn DirectoryCapability>, StorageError> {
        self.root.get_or_create_subdirectory(WORKING_DIR_NAME).await
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn ensure_root(&self) -> Result<(), StorageError> {
        let dir = self.working_dir().await.map_err(|e| {
            StorageError::Initialization(format!("cannot open '{WORKING_DIR_NAME}': {e}"))
        })?;
        let index = dir
            .read_file(INDEX_FILE)
            .await
            .map_err(|e| StorageError::Initialization(e.to_string()))?;
        if index.is_none() {
            dir.write_file(INDEX_FILE, b"[]")
                .await
                .map_err(|e| StorageError::Initialization(e.to_string()))?;
        }
        Ok(())
    }

    async fn read_text(&self, name: &str) -> Result<Option<String>, StorageError> {
        let dir = self.working_dir().await?;
        match dir.read_file(name).await? {
            Some(data) => String::from_utf8(data).map(Some).map_err(|e| {
                StorageError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            }),
            None => Ok(None),
        }
    }

    async fn write_text(&self, name: &str, text: &str) -> Result<(), StorageError> {
        let dir = self.working_dir().await?;
        dir.write_file(name, text.as_bytes()).await
    }

    async fn delete_entry(&self, name: &str) -> Result<(), StorageError> {
        let dir = self.working_dir().await?;
        dir.remove_entry(name).await
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Local
    }
}
