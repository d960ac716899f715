//! Command handlers and the storage wiring they share.

pub mod chat;
pub mod session;
pub mod settings;
pub mod setup;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use clap::Args;

use crate::{
    internal::{
        config::{CloudConfig, Preferences},
        session::SessionStore,
    },
    utils::storage::{
        StorageContext, StorageMode,
        auth::AuthRetry,
        cloud::ObjectStoreFs,
        local::{DirectoryGrant, LocalStorage},
        remote::CloudStorage,
        signin::ConsoleSignIn,
    },
};

/// Options accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Keep chats in this directory for this run
    #[arg(long, global = true, value_name = "DIR", conflicts_with = "cloud_path")]
    pub local: Option<PathBuf>,

    /// Root path of the chats in the cloud store
    #[arg(long, global = true, value_name = "PATH")]
    pub cloud_path: Option<String>,

    /// Preferences file to use instead of the per-user one
    #[arg(long, global = true, value_name = "FILE", hide = true)]
    pub preferences: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn preferences_path(&self) -> anyhow::Result<PathBuf> {
        match &self.preferences {
            Some(path) => Ok(path.clone()),
            None => Ok(Preferences::default_path()?),
        }
    }
}

/// The cloud object store with its sign-in flow.
#[derive(Clone)]
pub struct CloudParts {
    pub fs: Arc<ObjectStoreFs>,
    pub auth: Arc<ConsoleSignIn>,
    pub retry: AuthRetry,
}

impl CloudParts {
    /// Built from the `ANCHORCHAT_CLOUD*` variables; `None` when unset.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let Some(config) = CloudConfig::from_env().context("invalid cloud configuration")? else {
            return Ok(None);
        };
        let store = config
            .build_store()
            .context("failed to open the cloud store")?;
        let fs = Arc::new(ObjectStoreFs::new(store));
        let auth = Arc::new(ConsoleSignIn::new(Arc::clone(&fs), config));
        let retry = AuthRetry::new(auth.clone());
        Ok(Some(Self { fs, auth, retry }))
    }

    pub fn storage(&self, root: Option<&str>) -> CloudStorage {
        CloudStorage::new(self.fs.clone(), self.retry.clone(), root)
    }
}

/// Everything a command needs to reach the stored chats.
pub struct Workspace {
    pub context: StorageContext,
    pub cloud: Option<CloudParts>,
    /// Where the chats live, for display.
    pub location: String,
}

impl Workspace {
    /// Pick the storage for this run: `--local` wins, otherwise the cloud
    /// with `--cloud-path`, the remembered path or the default root.
    pub async fn open(global: &GlobalArgs) -> anyhow::Result<Self> {
        let cloud = CloudParts::from_env()?;
        if let Some(dir) = &global.local {
            return Ok(Self::local(dir, cloud));
        }

        let preferences = Preferences::load(&global.preferences_path()?).await;
        if global.cloud_path.is_none() && preferences.storage_mode == Some(StorageMode::Local) {
            bail!("local storage needs a directory grant on every run: pass --local <DIR>");
        }
        let root = global
            .cloud_path
            .as_deref()
            .or_else(|| preferences.cloud_root());
        Self::cloud(cloud, root)
    }

    pub fn local(dir: &std::path::Path, cloud: Option<CloudParts>) -> Self {
        let grant = DirectoryGrant::new(dir);
        Self {
            context: StorageContext::new(Arc::new(LocalStorage::new(grant.capability()))),
            cloud,
            location: dir.display().to_string(),
        }
    }

    pub fn cloud(cloud: Option<CloudParts>, root: Option<&str>) -> anyhow::Result<Self> {
        let Some(parts) = cloud else {
            bail!("no cloud store configured: set ANCHORCHAT_CLOUD or pass --local <DIR>");
        };
        let storage = parts.storage(root);
        let location = storage.root().to_string();
        Ok(Self {
            context: StorageContext::new(Arc::new(storage)),
            cloud: Some(parts),
            location,
        })
    }

    pub fn mode(&self) -> StorageMode {
        self.context.mode()
    }

    /// Initialize storage and hand out the session store.
    pub async fn session_store(&self) -> anyhow::Result<SessionStore> {
        self.initialize().await?;
        Ok(SessionStore::new(&self.context))
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        self.context.initialize().await.with_context(|| {
            format!(
                "cannot open {} storage at '{}'; check access and try again",
                self.mode(),
                self.location
            )
        })
    }
}
