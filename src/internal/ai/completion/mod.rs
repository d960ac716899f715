pub mod message;

use async_trait::async_trait;
use futures::stream::BoxStream;
pub use message::{ChatContent, ChatMessage, ContentPart};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HttpError: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JsonError: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("ProviderError{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ProviderError {
        status: Option<u16>,
        message: String,
    },

    #[error("StreamError: {0}")]
    StreamError(String),

    #[error("AttachmentError: {0}")]
    AttachmentError(String),

    #[error("ConfigError: {0}")]
    ConfigError(String),
}

/// A request to a model backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// System instruction; `None` when there is nothing to send.
    pub system: Option<String>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            system: None,
            stream: false,
        }
    }

    /// A single user prompt.
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(model, vec![ChatMessage::user(prompt)])
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// One item of a streamed reply. Parts without text carry no output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamPart {
    pub text: Option<String>,
}

impl StreamPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

pub type PartStream = BoxStream<'static, Result<StreamPart, ModelError>>;

/// A chat model reachable over the network.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run a request to completion and return the reply text.
    async fn chat(&self, request: ChatRequest) -> Result<String, ModelError>;

    /// Start a streamed reply.
    async fn chat_stream(&self, request: ChatRequest) -> Result<PartStream, ModelError>;
}
