//! Session storage: full session documents and settings, kept in step with the index.

use std::sync::Arc;

use super::{
    index::{SessionIndexStore, upsert_entry},
    state::{AppSettings, ChatSession, SessionIndexEntry},
};
use crate::utils::storage::{
    INDEX_FILE, SETTINGS_FILE, StorageBackend, StorageContext, StorageError,
};

/// Document name of a session.
pub fn session_file(id: &str) -> String {
    format!("{id}.json")
}

/// Reject ids that would name the index or settings document, or that fall
/// outside the `[A-Za-z0-9_-]` charset minted ids use.
pub fn check_session_id(id: &str) -> Result<(), StorageError> {
    let reserved = [INDEX_FILE, SETTINGS_FILE]
        .iter()
        .any(|name| name.strip_suffix(".json") == Some(id));
    let well_formed = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if reserved || !well_formed {
        return Err(StorageError::InvalidName(id.to_string()));
    }
    Ok(())
}

/// Manages session persistence on the active storage backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    index: SessionIndexStore,
}

impl SessionStore {
    pub fn new(context: &StorageContext) -> Self {
        let backend = context.backend();
        Self {
            index: SessionIndexStore::new(Arc::clone(&backend)),
            backend,
        }
    }

    pub fn index(&self) -> &SessionIndexStore {
        &self.index
    }

    pub async fn list(&self) -> Result<Vec<SessionIndexEntry>, StorageError> {
        self.index.list().await
    }

    /// Write the session document, then the index with its entry upserted.
    ///
    /// The index is read before anything is written, so a failed read leaves
    /// both documents untouched.
    pub async fn save_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        check_session_id(&session.id)?;
        let mut entries = self.index.list().await?;
        upsert_entry(&mut entries, session.index_entry());

        let text = serde_json::to_string_pretty(session)?;
        self.backend
            .write_text(&session_file(&session.id), &text)
            .await?;
        self.index.write(&entries).await?;

        tracing::debug!(session_id = %session.id, messages = session.messages.len(), "session saved");
        Ok(())
    }

    /// `None` when the document is missing or cannot be parsed.
    pub async fn load_session(&self, id: &str) -> Result<Option<ChatSession>, StorageError> {
        check_session_id(id)?;
        let Some(text) = self.backend.read_text(&session_file(id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "skipping corrupt session document");
                Ok(None)
            }
        }
    }

    /// Remove the index entry, then the document.
    ///
    /// The two steps are independent: if the second fails the document is
    /// left orphaned but never listed.
    pub async fn delete_session(&self, id: &str) -> Result<(), StorageError> {
        check_session_id(id)?;
        self.index.remove(id).await?;
        self.backend.delete_entry(&session_file(id)).await?;
        tracing::debug!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Stored settings merged over the defaults.
    pub async fn load_settings(&self) -> Result<AppSettings, StorageError> {
        let Some(text) = self.backend.read_text(SETTINGS_FILE).await? else {
            return Ok(AppSettings::default());
        };
        match serde_json::from_str(&text) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(error = %e, "settings document is corrupt, using defaults");
                Ok(AppSettings::default())
            }
        }
    }

    pub async fn save_settings(&self, settings: &AppSettings) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(settings)?;
        self.backend.write_text(SETTINGS_FILE, &text).await
    }
}
