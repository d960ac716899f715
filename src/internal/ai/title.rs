//! Short session titles derived from the first message.

use std::sync::Arc;

use super::{
    completion::{ChatRequest, ModelBackend},
    providers::anthropic::CLAUDE_HAIKU_4_5,
};

/// Title used when none could be generated.
pub const FALLBACK_TITLE: &str = "New Chat";

#[derive(Clone)]
pub struct TitleGenerator {
    backend: Arc<dyn ModelBackend>,
    model: String,
}

impl TitleGenerator {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            model: CLAUDE_HAIKU_4_5.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Never fails; falls back to [`FALLBACK_TITLE`].
    pub async fn generate_title(&self, first_message: &str) -> String {
        let prompt = format!(
            "Summarize this message into a short 3-5 word title. No quotes. Message: \"{first_message}\""
        );
        match self
            .backend
            .chat(ChatRequest::prompt(&self.model, prompt))
            .await
        {
            Ok(reply) => clean_title(&reply).unwrap_or_else(|| FALLBACK_TITLE.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "title generation failed");
                FALLBACK_TITLE.to_string()
            }
        }
    }
}

fn clean_title(reply: &str) -> Option<String> {
    let title = reply
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”'))
        .trim();
    (!title.is_empty()).then(|| title.to_string())
}
