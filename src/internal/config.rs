//! Configuration: user preferences on disk and the cloud store settings read
//! from the environment.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::storage::StorageMode;

/// Default bucket when `ANCHORCHAT_CLOUD_BUCKET` is unset.
pub const DEFAULT_BUCKET: &str = "anchorchat";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported cloud kind: '{0}' (expected s3, r2 or fs)")]
    UnsupportedKind(String),

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("invalid ANCHORCHAT_CLOUD_ENDPOINT URL '{url}': {source}")]
    InvalidEndpoint {
        url: String,
        source: url::ParseError,
    },

    #[error("ANCHORCHAT_CLOUD_FS_ROOT is required when ANCHORCHAT_CLOUD=fs")]
    MissingFsRoot,

    #[error("failed to build object store: {0}")]
    Store(#[from] object_store::Error),

    #[error("preferences I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no configuration directory is available on this system")]
    NoConfigDir,
}

/// Choices remembered between runs.
///
/// Only a cloud choice is reattached automatically; a local directory grant
/// has to be given again on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_mode: Option<StorageMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl Preferences {
    /// `<config_dir>/anchorchat/preferences.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("anchorchat").join("preferences.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Missing or unreadable preferences load as empty.
    pub async fn load(path: &Path) -> Self {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read preferences");
                return Self::default();
            }
        };
        toml::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt preferences");
            Self::default()
        })
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let text = toml::to_string(self)?;
        tokio::fs::write(path, text).await.map_err(io_err)
    }

    /// Record the chosen mode; the path is kept for cloud only.
    pub fn remember(&mut self, mode: StorageMode, cloud_path: Option<&str>) {
        self.storage_mode = Some(mode);
        if mode == StorageMode::Cloud {
            self.storage_path = cloud_path.map(str::to_string);
        }
    }

    /// Forget the chosen mode so the next run asks again.
    pub fn forget_mode(&mut self) {
        self.storage_mode = None;
    }

    /// The cloud root to reattach to, when cloud mode was chosen.
    pub fn cloud_root(&self) -> Option<&str> {
        match self.storage_mode {
            Some(StorageMode::Cloud) => self.storage_path.as_deref(),
            _ => None,
        }
    }
}

/// Which object store backs the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudKind {
    S3,
    R2,
    /// A directory on this machine, for offline use and tests.
    Fs,
}

impl std::str::FromStr for CloudKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(CloudKind::S3),
            "r2" => Ok(CloudKind::R2),
            "fs" => Ok(CloudKind::Fs),
            other => Err(ConfigError::UnsupportedKind(other.to_string())),
        }
    }
}

/// Settings for the cloud object store.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudConfig {
    pub kind: CloudKind,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub allow_http: bool,
    pub fs_root: Option<PathBuf>,
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("kind", &self.kind)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("allow_http", &self.allow_http)
            .field("fs_root", &self.fs_root)
            .finish()
    }
}

impl CloudConfig {
    /// Read the `ANCHORCHAT_CLOUD*` variables. `None` when no cloud is configured.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`CloudConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(kind) = lookup("ANCHORCHAT_CLOUD") else {
            return Ok(None);
        };
        let kind: CloudKind = kind.parse()?;

        let bucket = lookup("ANCHORCHAT_CLOUD_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        if bucket.trim().is_empty() {
            return Err(ConfigError::Empty("ANCHORCHAT_CLOUD_BUCKET"));
        }

        let endpoint = lookup("ANCHORCHAT_CLOUD_ENDPOINT");
        if let Some(url) = &endpoint {
            url::Url::parse(url).map_err(|source| ConfigError::InvalidEndpoint {
                url: url.clone(),
                source,
            })?;
        }

        let access_key = lookup("ANCHORCHAT_CLOUD_ACCESS_KEY");
        if access_key.as_deref() == Some("") {
            return Err(ConfigError::Empty("ANCHORCHAT_CLOUD_ACCESS_KEY"));
        }
        let secret_key = lookup("ANCHORCHAT_CLOUD_SECRET_KEY");
        if secret_key.as_deref() == Some("") {
            return Err(ConfigError::Empty("ANCHORCHAT_CLOUD_SECRET_KEY"));
        }

        let fs_root = lookup("ANCHORCHAT_CLOUD_FS_ROOT").map(PathBuf::from);
        if kind == CloudKind::Fs && fs_root.is_none() {
            return Err(ConfigError::MissingFsRoot);
        }

        Ok(Some(Self {
            kind,
            bucket,
            endpoint,
            region: lookup("ANCHORCHAT_CLOUD_REGION"),
            access_key,
            secret_key,
            allow_http: lookup("ANCHORCHAT_CLOUD_ALLOW_HTTP").as_deref() == Some("true"),
            fs_root,
        }))
    }

    /// A copy carrying freshly entered credentials.
    pub fn with_credentials(&self, access_key: String, secret_key: String) -> Self {
        Self {
            access_key: Some(access_key),
            secret_key: Some(secret_key),
            ..self.clone()
        }
    }

    /// Whether requests can be signed without asking the user.
    pub fn has_credentials(&self) -> bool {
        self.kind == CloudKind::Fs || (self.access_key.is_some() && self.secret_key.is_some())
    }

    pub fn build_store(&self) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        match self.kind {
            CloudKind::S3 | CloudKind::R2 => {
                let mut builder =
                    object_store::aws::AmazonS3Builder::new().with_bucket_name(&self.bucket);
                if let Some(endpoint) = &self.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                match (&self.region, self.kind) {
                    (Some(region), _) => builder = builder.with_region(region),
                    // R2 ignores regions but the signer needs one
                    (None, CloudKind::R2) => builder = builder.with_region("auto"),
                    _ => {}
                }
                if let Some(key) = &self.access_key {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = &self.secret_key {
                    builder = builder.with_secret_access_key(secret);
                }
                if self.allow_http {
                    builder = builder.with_allow_http(true);
                }
                Ok(Arc::new(builder.build()?))
            }
            CloudKind::Fs => {
                let root = self.fs_root.as_ref().ok_or(ConfigError::MissingFsRoot)?;
                std::fs::create_dir_all(root).map_err(|source| ConfigError::Io {
                    path: root.clone(),
                    source,
                })?;
                Ok(Arc::new(
                    object_store::local::LocalFileSystem::new_with_prefix(root)?,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(vars: &'a HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_no_cloud_configured() {
        let vars = HashMap::new();
        assert!(CloudConfig::from_lookup(lookup(&vars)).unwrap().is_none());
    }

    #[test]
    fn test_r2_config() {
        let vars = HashMap::from([
            ("ANCHORCHAT_CLOUD", "r2"),
            ("ANCHORCHAT_CLOUD_ENDPOINT", "https://acct.r2.cloudflarestorage.com"),
            ("ANCHORCHAT_CLOUD_ACCESS_KEY", "AKID"),
            ("ANCHORCHAT_CLOUD_SECRET_KEY", "secret"),
        ]);

        let config = CloudConfig::from_lookup(lookup(&vars)).unwrap().unwrap();

        assert_eq!(config.kind, CloudKind::R2);
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert!(config.has_credentials());
        assert!(!format!("{config:?}").contains("secret\""));
        assert!(config.build_store().is_ok());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let cases = [
            (vec![("ANCHORCHAT_CLOUD", "gcs")], "unsupported"),
            (
                vec![("ANCHORCHAT_CLOUD", "s3"), ("ANCHORCHAT_CLOUD_BUCKET", "")],
                "BUCKET",
            ),
            (
                vec![("ANCHORCHAT_CLOUD", "s3"), ("ANCHORCHAT_CLOUD_ENDPOINT", "not a url")],
                "ENDPOINT",
            ),
            (
                vec![("ANCHORCHAT_CLOUD", "s3"), ("ANCHORCHAT_CLOUD_ACCESS_KEY", "")],
                "ACCESS_KEY",
            ),
            (vec![("ANCHORCHAT_CLOUD", "fs")], "FS_ROOT"),
        ];
        for (vars, needle) in cases {
            let vars: HashMap<_, _> = vars.into_iter().collect();
            let err = CloudConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(err.to_string().contains(needle), "{err}");
        }
    }

    #[test]
    fn test_fs_store_creates_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("cloud");
        let root_str = root.to_string_lossy().into_owned();
        let vars = HashMap::from([
            ("ANCHORCHAT_CLOUD", "fs"),
            ("ANCHORCHAT_CLOUD_FS_ROOT", root_str.as_str()),
        ]);

        let config = CloudConfig::from_lookup(lookup(&vars)).unwrap().unwrap();
        config.build_store().unwrap();

        assert!(root.is_dir());
        assert!(config.has_credentials());
    }

    #[test]
    fn test_with_credentials() {
        let vars = HashMap::from([("ANCHORCHAT_CLOUD", "s3")]);
        let config = CloudConfig::from_lookup(lookup(&vars)).unwrap().unwrap();
        assert!(!config.has_credentials());

        let signed = config.with_credentials("AKID".into(), "s".into());
        assert!(signed.has_credentials());
        assert_eq!(signed.bucket, config.bucket);
    }

    #[tokio::test]
    async fn test_preferences_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("preferences.toml");
        assert_eq!(Preferences::load(&path).await, Preferences::default());

        let mut prefs = Preferences::default();
        prefs.remember(StorageMode::Cloud, Some("~/my-chats"));
        prefs.save(&path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("storage-mode = \"cloud\""));
        assert!(text.contains("storage-path = \"~/my-chats\""));

        let loaded = Preferences::load(&path).await;
        assert_eq!(loaded.cloud_root(), Some("~/my-chats"));

        let mut loaded = loaded;
        loaded.forget_mode();
        assert_eq!(loaded.cloud_root(), None);
    }

    #[tokio::test]
    async fn test_local_choice_is_not_reattached() {
        let mut prefs = Preferences::default();
        prefs.remember(StorageMode::Local, None);
        assert_eq!(prefs.storage_mode, Some(StorageMode::Local));
        assert_eq!(prefs.cloud_root(), None);
    }

    #[tokio::test]
    async fn test_corrupt_preferences_load_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("preferences.toml");
        std::fs::write(&path, "storage-mode = [").unwrap();
        assert_eq!(Preferences::load(&path).await, Preferences::default());
    }
}
