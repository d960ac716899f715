//! Anthropic Messages API backend.
//!
//! # Example
//! ```no_run
//! use anchorchat::internal::ai::providers::anthropic;
//!
//! let client = anthropic::Client::from_env().unwrap();
//! let backend = anthropic::AnthropicBackend::new(client);
//! ```

pub mod client;
pub mod completion;

pub use client::{AnthropicProvider, Client};
pub use completion::AnthropicBackend;

// Model constants
pub const CLAUDE_OPUS_4_6: &str = "claude-opus-4-6";
pub const CLAUDE_OPUS_4_5: &str = "claude-opus-4-5";
pub const CLAUDE_SONNET_4_5: &str = "claude-sonnet-4-5";
pub const CLAUDE_HAIKU_4_5: &str = "claude-haiku-4-5";
pub const CLAUDE_OPUS_4: &str = "claude-opus-4-0";
pub const CLAUDE_SONNET_4: &str = "claude-sonnet-4-0";

// Anthropic API version
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A selectable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
}

/// Models offered for selection, newest first.
pub const AVAILABLE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: CLAUDE_OPUS_4_6,
        name: "Claude Opus 4.6 (Preview)",
    },
    ModelInfo {
        id: CLAUDE_OPUS_4_5,
        name: "Claude Opus 4.5",
    },
    ModelInfo {
        id: CLAUDE_SONNET_4_5,
        name: "Claude Sonnet 4.5",
    },
    ModelInfo {
        id: CLAUDE_HAIKU_4_5,
        name: "Claude Haiku 4.5",
    },
    ModelInfo {
        id: CLAUDE_OPUS_4,
        name: "Claude Opus 4",
    },
    ModelInfo {
        id: CLAUDE_SONNET_4,
        name: "Claude Sonnet 4",
    },
];

/// Display name of a model id, or the id itself when it is not in the catalog.
pub fn display_name(id: &str) -> &str {
    AVAILABLE_MODELS
        .iter()
        .find(|m| m.id == id)
        .map(|m| m.name)
        .unwrap_or(id)
}
