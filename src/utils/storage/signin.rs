//! Interactive sign-in for the object-store backed cloud.
use std::{
    io::{BufRead, Write},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use super::{
    StorageError,
    auth::{CloudAuth, CloudUser},
    cloud::ObjectStoreFs,
};
use crate::internal::config::{CloudConfig, CloudKind};

/// Asks for an access key pair on the terminal and rebuilds the store with it.
///
/// The access key id doubles as the user name.
pub struct ConsoleSignIn {
    fs: Arc<ObjectStoreFs>,
    config: Mutex<CloudConfig>,
}

impl ConsoleSignIn {
    pub fn new(fs: Arc<ObjectStoreFs>, config: CloudConfig) -> Self {
        Self {
            fs,
            config: Mutex::new(config),
        }
    }

    fn config(&self) -> CloudConfig {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn prompt_credentials() -> std::io::Result<(String, String)> {
    let mut stderr = std::io::stderr();
    write!(stderr, "Access key id: ")?;
    stderr.flush()?;
    let mut access_key = String::new();
    std::io::stdin().lock().read_line(&mut access_key)?;
    let secret = rpassword::prompt_password("Secret access key: ")?;
    Ok((access_key.trim().to_string(), secret.trim().to_string()))
}

#[async_trait]
impl CloudAuth for ConsoleSignIn {
    async fn sign_in(&self) -> Result<(), StorageError> {
        let current = self.config();
        if current.kind == CloudKind::Fs {
            return Ok(());
        }

        let (access_key, secret) = tokio::task::spawn_blocking(prompt_credentials)
            .await
            .map_err(|e| StorageError::AuthExpired(format!("sign-in aborted: {e}")))?
            .map_err(|e| StorageError::AuthExpired(format!("sign-in aborted: {e}")))?;
        if access_key.is_empty() || secret.is_empty() {
            return Err(StorageError::AuthExpired("no credentials entered".into()));
        }

        let updated = current.with_credentials(access_key, secret);
        let store = updated
            .build_store()
            .map_err(|e| StorageError::Initialization(e.to_string()))?;
        self.fs.replace_store(store).await;
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = updated;

        tracing::info!("signed in to the cloud store");
        Ok(())
    }

    fn is_signed_in(&self) -> bool {
        self.config().has_credentials()
    }

    async fn get_user(&self) -> Result<CloudUser, StorageError> {
        let config = self.config();
        let username = match (config.kind, config.access_key) {
            (CloudKind::Fs, _) => whoami_local(),
            (_, Some(key)) => key,
            (_, None) => return Err(StorageError::AuthExpired("not signed in".into())),
        };
        Ok(CloudUser { username })
    }
}

fn whoami_local() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "local".to_string())
}
