//! The session index: `index.json`, one [`SessionIndexEntry`] per saved session.

use std::sync::Arc;

use super::state::SessionIndexEntry;
use crate::utils::storage::{INDEX_FILE, StorageBackend, StorageError};

/// Insert or replace `entry`.
///
/// An entry with the same id is replaced where it stands; a new id goes to
/// the front.
pub fn upsert_entry(entries: &mut Vec<SessionIndexEntry>, entry: SessionIndexEntry) {
    match entries.iter_mut().find(|e| e.id == entry.id) {
        Some(existing) => *existing = entry,
        None => entries.insert(0, entry),
    }
}

/// Reads and rewrites the index document on a storage backend.
#[derive(Clone)]
pub struct SessionIndexStore {
    backend: Arc<dyn StorageBackend>,
}

impl SessionIndexStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// All entries in stored order.
    ///
    /// A missing or unparsable index reads as empty. Read failures propagate,
    /// so a flaky read can never lead to the index being overwritten.
    pub async fn list(&self) -> Result<Vec<SessionIndexEntry>, StorageError> {
        let Some(text) = self.backend.read_text(INDEX_FILE).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&text) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(error = %e, "session index is corrupt, treating it as empty");
                Ok(Vec::new())
            }
        }
    }

    pub async fn upsert(&self, entry: SessionIndexEntry) -> Result<(), StorageError> {
        let mut entries = self.list().await?;
        upsert_entry(&mut entries, entry);
        self.write(&entries).await
    }

    /// Drop the entry for `id`. Nothing is written when there is none.
    pub async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let mut entries = self.list().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(());
        }
        self.write(&entries).await
    }

    /// Replace the whole index document.
    pub async fn write(&self, entries: &[SessionIndexEntry]) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(entries)?;
        self.backend.write_text(INDEX_FILE, &text).await
    }
}
