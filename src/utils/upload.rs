//! Mirrors locally selected files into the cloud staging area the model backend reads from.
//!
//! The model backend can only dereference cloud paths, so attachments are
//! staged in the cloud even when sessions are stored locally.
use std::{path::Path, sync::Arc};

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::{
    internal::session::Attachment,
    utils::storage::{
        StorageError,
        auth::AuthRetry,
        cloud::{CloudFs, join_path},
    },
};

/// Fixed cloud directory for staged attachments.
pub const STAGING_ROOT: &str = "~/anchorchat_temp_uploads";

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9.-]").expect("Invalid Regex"));

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to stage attachment: {0}")]
    Storage(#[from] StorageError),
}

/// A file picked by the user, not yet uploaded.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl LocalFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let data = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(name, mime_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "_").into_owned()
}

/// Writes attachments to [`STAGING_ROOT`] on the cloud store.
#[derive(Clone)]
pub struct AttachmentUploader {
    fs: Arc<dyn CloudFs>,
    retry: AuthRetry,
    staging_root: String,
}

impl AttachmentUploader {
    pub fn new(fs: Arc<dyn CloudFs>, retry: AuthRetry) -> Self {
        Self {
            fs,
            retry,
            staging_root: STAGING_ROOT.to_string(),
        }
    }

    pub fn with_staging_root(mut self, root: impl Into<String>) -> Self {
        self.staging_root = root.into();
        self
    }

    /// Stage `file` and describe it as an [`Attachment`].
    ///
    /// Returns `None` on any failure so the turn can go on without it.
    pub async fn upload(&self, file: &LocalFile) -> Option<Attachment> {
        match self.try_upload(file).await {
            Ok(attachment) => {
                tracing::debug!(
                    name = %attachment.name,
                    locator = %attachment.remote_locator,
                    "attachment staged"
                );
                Some(attachment)
            }
            Err(e) => {
                tracing::warn!(name = %file.name, error = %e, "attachment upload failed");
                None
            }
        }
    }

    pub async fn try_upload(&self, file: &LocalFile) -> Result<Attachment, UploadError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let target = join_path(
            &self.staging_root,
            &format!("{timestamp}_{}", sanitize_file_name(&file.name)),
        );

        self.retry
            .run(|| self.fs.mkdir(&self.staging_root, true))
            .await?;
        let written = self
            .retry
            .run(|| self.fs.write(&target, file.data.clone()))
            .await?;

        let remote_locator = if written.path.is_empty() {
            target
        } else {
            written.path
        };
        Ok(Attachment {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            remote_locator,
            size: file.size(),
        })
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

    fn uploader(fs: Arc<dyn CloudFs>) -> AttachmentUploader {
        AttachmentUploader::new(fs, AuthRetry::new(Arc::new(CountingAuth::default())))
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report (final).pdf"), "report__final_.pdf");
        assert_eq!(sanitize_file_name("ünï code.txt"), "_n__code.txt");
        assert_eq!(sanitize_file_name("plain-name.v2.md"), "plain-name.v2.md");
    }

    #[tokio::test]
    async fn test_upload_stages_bytes_under_staging_root() {
        let fs = Arc::new(ObjectStoreFs::new(Arc::new(InMemory::new())));
        let uploader = uploader(fs.clone());
        let file = LocalFile::new(
            "report (final).pdf",
            "application/pdf",
            b"%PDF-1.7".to_vec(),
        );

        let attachment = uploader.upload(&file).await.unwrap();

        assert_eq!(attachment.name, "report (final).pdf");
        assert_eq!(attachment.mime_type, "application/pdf");
        assert_eq!(attachment.size, 8);
        assert!(attachment.remote_locator.starts_with(&format!("{STAGING_ROOT}/")));

        let file_name = attachment.remote_locator.rsplit('/').next().unwrap();
        assert!(file_name.ends_with("_report__final_.pdf"));
        assert!(
            file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        );

        let stored = fs.read(&attachment.remote_locator).await.unwrap();
        assert_eq!(&stored[..], b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_upload_failure_returns_none() {
        let inner = Arc::new(ObjectStoreFs::new(Arc::new(InMemory::new())));
        let fs = Arc::new(FlakyCloudFs::new(inner, usize::MAX));
        let uploader = uploader(fs);
        let file = LocalFile::new("a.txt", "text/plain", b"hi".to_vec());

        assert!(uploader.upload(&file).await.is_none());
    }

    #[tokio::test]
    async fn test_local_file_from_path_guesses_mime() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let file = LocalFile::from_path(&path).await.unwrap();

        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size(), 5);
    }

    #[tokio::test]
    async fn test_local_file_missing_path() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LocalFile::from_path(&tmp.path().join("gone.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }
}
