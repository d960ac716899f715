use serde::{Deserialize, Serialize};

use crate::internal::session::{Message, Role};

/// A message as handed to a model backend.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: ChatContent,
}

/// Plain text, or a multi-part payload when files are attached.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part message.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    /// A file in the cloud store, referenced by path.
    File {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Text {
        text: String,
    },
}

impl ChatMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: ChatContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Text of the message with file parts left out.
    pub fn plain_text(&self) -> String {
        match &self.content {
            ChatContent::Text(text) => text.clone(),
            ChatContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::File { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&Message> for ChatMessage {
    /// One `file` part per attachment followed by the text, or plain text
    /// when there are no attachments.
    fn from(message: &Message) -> Self {
        let attachments = message.attachments();
        if attachments.is_empty() {
            return Self::text(message.role, message.content.clone());
        }

        let mut parts: Vec<ContentPart> = attachments
            .iter()
            .map(|a| ContentPart::File {
                path: a.remote_locator.clone(),
                mime_type: Some(a.mime_type.clone()),
                name: Some(a.name.clone()),
            })
            .collect();
        parts.push(ContentPart::Text {
            text: message.content.clone(),
        });
        Self {
            role: message.role,
            content: ChatContent::Parts(parts),
        }
    }
}
