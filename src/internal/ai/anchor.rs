//! Rolling memory anchor: a bounded summary re-derived after every turn.

use std::sync::Arc;

use thiserror::Error;

use super::{
    completion::{ChatRequest, ModelBackend, ModelError},
    providers::anthropic::CLAUDE_HAIKU_4_5,
};
use crate::internal::session::{Message, Role};

/// Upper bound on anchor length, in words.
pub const MAX_ANCHOR_WORDS: usize = 150;

/// Stated in the prompt when there is no prior anchor.
const NO_ANCHOR: &str = "None initialized.";

#[derive(Debug, Error)]
pub enum DistillationError {
    #[error("distillation call failed: {0}")]
    Model(#[from] ModelError),

    #[error("distillation returned an empty anchor")]
    EmptyReply,
}

/// Compresses the prior anchor and the latest exchange into a new anchor.
#[derive(Clone)]
pub struct MemoryAnchorDistiller {
    backend: Arc<dyn ModelBackend>,
    model: String,
}

impl MemoryAnchorDistiller {
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

    /// The new anchor, or the prior one (empty if none) when distillation fails.
    pub async fn update_anchor(&self, current: Option<&str>, messages: &[Message]) -> String {
        match self.try_update_anchor(current, messages).await {
            Ok(anchor) => anchor,
            Err(e) => {
                tracing::warn!(error = %e, "memory anchor update failed, keeping the previous anchor");
                current.unwrap_or_default().to_string()
            }
        }
    }

    pub async fn try_update_anchor(
        &self,
        current: Option<&str>,
        messages: &[Message],
    ) -> Result<String, DistillationError> {
        let prompt = distillation_prompt(current, messages);
        let reply = self
            .backend
            .chat(ChatRequest::prompt(&self.model, prompt))
            .await?;
        let anchor = cap_words(reply.trim(), MAX_ANCHOR_WORDS);
        if anchor.is_empty() {
            return Err(DistillationError::EmptyReply);
        }
        Ok(anchor)
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
        Role::System => "SYSTEM",
    }
}

/// Prompt over the prior anchor and the last two of `messages`.
pub fn distillation_prompt(current: Option<&str>, messages: &[Message]) -> String {
    let current = current
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(NO_ANCHOR);
    let recent = messages
        .iter()
        .skip(messages.len().saturating_sub(2))
        .map(|m| format!("{}: {}", role_label(m.role), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You maintain a "Dynamic Context Anchor": the long-term memory of a conversation.

INPUTS:
1. Current Anchor: "{current}"
2. New Interaction:
{recent}

TASK:
Analyze the conversation flow and distill the context.

STRATEGY:
- Goal Tracking: What is the user trying to achieve globally?
- Knowledge Graph: Extract key facts, preferences, referenced file contents and technical constraints.
- Progress: Where are we in the problem-solving process?
- Pruning: Remove obsolete details, such as errors that have since been fixed.

OUTPUT:
A concise, dense summary (max {MAX_ANCHOR_WORDS} words) of the current state of the mission, the active constraints and the key learnings. Synthesize; do not recount the history."#
    )
}

/// Keep at most `max` words. Text within the limit is returned unchanged.
pub fn cap_words(text: &str, max: usize) -> String {
    if text.split_whitespace().count() <= max {
        return text.to_string();
    }
    text.split_whitespace()
        .take(max)
        .collect::<Vec<_>>()
        .join(" ")
}
