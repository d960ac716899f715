//! Model access for chat.
//!
//! The architecture consists of:
//!
//! - **Provider abstraction**: [`ModelBackend`] is the seam every model call
//!   goes through; [`providers::anthropic`] implements it over HTTP.
//! - **Streaming**: [`ChatStreamOrchestrator`] turns a conversation into a
//!   stream of reply fragments.
//! - **Helpers**: [`MemoryAnchorDistiller`] keeps the rolling context summary
//!   and [`TitleGenerator`] names new sessions.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use anchorchat::internal::ai::{
//!     ChatStreamOrchestrator,
//!     providers::anthropic::{AnthropicBackend, Client},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(AnthropicBackend::new(Client::from_env()?));
//! let orchestrator = ChatStreamOrchestrator::new(backend);
//! # let _ = orchestrator;
//! # Ok(())
//! # }
//! ```

pub mod anchor;
pub mod client;
pub mod completion;
pub mod orchestrator;
pub mod providers;
pub mod title;

pub use anchor::MemoryAnchorDistiller;
pub use completion::{ChatRequest, ModelBackend, ModelError};
pub use orchestrator::ChatStreamOrchestrator;
pub use title::TitleGenerator;
