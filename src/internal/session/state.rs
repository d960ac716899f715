//! Session document types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique session identifier.
pub type SessionId = String;

/// Model used when settings do not name one.
pub const DEFAULT_MODEL: &str = "claude-opus-4-6";

/// A full conversation as persisted in `<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Minted once on the first turn; never changes.
    pub id: SessionId,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Rolling summary standing in for the full history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_anchor: Option<String>,
}

impl ChatSession {
    pub fn new(id: impl Into<SessionId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            updated_at: now_millis(),
            messages: Vec::new(),
            memory_anchor: None,
        }
    }

    /// The listing projection of this session.
    pub fn index_entry(&self) -> SessionIndexEntry {
        SessionIndexEntry {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Who authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            role,
            content: content.into(),
            attachments: None,
            timestamp: now_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Attach files; an empty list leaves the message without attachments.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = if attachments.is_empty() {
            None
        } else {
            Some(attachments)
        };
        self
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.as_deref().unwrap_or_default()
    }
}

/// A file staged in the cloud store and referenced by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Display name as picked by the user.
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Path of the staged copy in the cloud store.
    pub remote_locator: String,
    pub size: u64,
}

/// Listing projection of a [`ChatSession`], stored in `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndexEntry {
    pub id: SessionId,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Per-context user settings, stored in `settings.json`.
///
/// Missing fields take their defaults on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub system_prompt: String,
    pub default_model: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Current time at the millisecond precision documents are stored with.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Mint a new session id.
pub fn generate_session_id() -> SessionId {
    uuid::Uuid::new_v4().to_string()
}

fn generate_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
