//! Cloud storage backend: documents addressed by path under a configurable root.
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    INDEX_FILE, StorageBackend, StorageError, StorageMode,
    auth::AuthRetry,
    cloud::{CloudFs, join_path},
};

/// Root used when no path was chosen.
pub const DEFAULT_CLOUD_ROOT: &str = "~/anchorchat-memory";
/// Subdirectory created under the root for uploads.
pub const UPLOADS_DIR: &str = "uploads";

/// Cloud backend. Every call goes through [`AuthRetry`].
pub struct CloudStorage {
    fs: Arc<dyn CloudFs>,
    retry: AuthRetry,
    root: String,
}

impl CloudStorage {
    /// `root` falls back to [`DEFAULT_CLOUD_ROOT`] when absent or blank; a
    /// trailing `/` is dropped.
    pub fn new(fs: Arc<dyn CloudFs>, retry: AuthRetry, root: Option<&str>) -> Self {
        let root = root
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_CLOUD_ROOT)
            .trim_end_matches('/')
            .to_string();
        Self { fs, retry, root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn path_of(&self, name: &str) -> String {
        join_path(&self.root, name)
    }

    async fn ensure_dir(&self, path: &str) -> Result<(), StorageError> {
        self.retry
            .run(|| self.fs.mkdir(path, true))
            .await
    }
}

#[async_trait]
impl StorageBackend for CloudStorage {
    async fn ensure_root(&self) -> Result<(), StorageError> {
        let init = |e: StorageError| StorageError::Initialization(e.to_string());

        self.ensure_dir(&self.root).await.map_err(init)?;
        self.ensure_dir(&self.path_of(UPLOADS_DIR))
            .await
            .map_err(init)?;

        let index = self.path_of(INDEX_FILE);
        match self.retry.run(|| self.fs.read(&index)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %index, "creating empty session index");
                self.retry
                    .run(|| self.fs.write(&index, Bytes::from_static(b"[]")))
                    .await
                    .map(|_| ())
                    .map_err(init)
            }
            Err(e) => Err(init(e)),
        }
    }

    async fn read_text(&self, name: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_of(name);
        match self.retry.run(|| self.fs.read(&path)).await {
            Ok(data) => String::from_utf8(data.to_vec()).map(Some).map_err(|e| {
                StorageError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            }),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write_text(&self, name: &str, text: &str) -> Result<(), StorageError> {
        let path = self.path_of(name);
        let data = Bytes::copy_from_slice(text.as_bytes());
        self.retry
            .run(|| self.fs.write(&path, data.clone()))
            .await
            .map(|_| ())
    }

    async fn delete_entry(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_of(name);
        match self.retry.run(|| self.fs.delete(&path)).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Cloud
    }
}

#[cfg(test)]
mod tests {
    use object_store::memory::InMemory;

    use super::*;
    use crate::utils::{
        storage::cloud::ObjectStoreFs,
        test::{CountingAuth, FlakyCloudFs},
    };

    fn memory_fs() -> Arc<ObjectStoreFs> {
        Arc::new(ObjectStoreFs::new(Arc::new(InMemory::new())))
    }

    fn cloud(fs: Arc<dyn CloudFs>, auth: Arc<CountingAuth>, root: Option<&str>) -> CloudStorage {
        CloudStorage::new(fs, AuthRetry::new(auth), root)
    }

    #[test]
    fn test_root_normalization() {
        let auth = Arc::new(CountingAuth::default());
        assert_eq!(
            cloud(memory_fs(), auth.clone(), None).root(),
            DEFAULT_CLOUD_ROOT
        );
        assert_eq!(
            cloud(memory_fs(), auth.clone(), Some("  ")).root(),
            DEFAULT_CLOUD_ROOT
        );
        assert_eq!(
            cloud(memory_fs(), auth, Some("~/chats/")).root(),
            "~/chats"
        );
    }

    #[tokio::test]
    async fn test_ensure_root_writes_empty_index() {
        let fs = memory_fs();
        let storage = cloud(fs.clone(), Arc::new(CountingAuth::default()), Some("~/m"));

        storage.ensure_root().await.unwrap();

        assert_eq!(&fs.read("~/m/index.json").await.unwrap()[..], b"[]");
    }

    #[tokio::test]
    async fn test_ensure_root_preserves_index() {
        let fs = memory_fs();
        fs.write("~/m/index.json", Bytes::from_static(b"[{\"id\":\"x\"}]"))
            .await
            .unwrap();
        let storage = cloud(fs.clone(), Arc::new(CountingAuth::default()), Some("~/m"));

        storage.ensure_root().await.unwrap();

        assert_eq!(
            &fs.read("~/m/index.json").await.unwrap()[..],
            b"[{\"id\":\"x\"}]"
        );
    }

    #[tokio::test]
    async fn test_read_write_delete() {
        let storage = cloud(memory_fs(), Arc::new(CountingAuth::default()), None);

        assert!(storage.read_text("s.json").await.unwrap().is_none());
        storage.write_text("s.json", "{\"a\":1}").await.unwrap();
        assert_eq!(
            storage.read_text("s.json").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        storage.delete_entry("s.json").await.unwrap();
        storage.delete_entry("s.json").await.unwrap();
        assert!(storage.read_text("s.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_login_is_recovered_transparently() {
        let auth = Arc::new(CountingAuth::default());
        let fs = Arc::new(FlakyCloudFs::new(memory_fs(), 1));
        let storage = cloud(fs.clone(), auth.clone(), None);

        storage.write_text("a.json", "hello").await.unwrap();

        assert_eq!(auth.sign_ins(), 1);
        assert_eq!(fs.calls(), 2);
        assert_eq!(storage.read_text("a.json").await.unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_unrecoverable_login_surfaces_on_init() {
        let auth = Arc::new(CountingAuth::default());
        let fs = Arc::new(FlakyCloudFs::new(memory_fs(), usize::MAX));
        let storage = cloud(fs.clone(), auth.clone(), None);

        let err = storage.ensure_root().await.unwrap_err();

        assert!(matches!(err, StorageError::Initialization(_)));
        assert_eq!(auth.sign_ins(), 1);
        assert_eq!(fs.calls(), 2);
    }
}
