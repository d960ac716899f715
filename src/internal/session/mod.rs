//! Chat session persistence.
//!
//! A session is stored as one JSON document named after its id. A separate
//! index document lists `{id, title, updatedAt}` for every session so the
//! listing never loads full histories. Settings live in their own document.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn demo(context: anchorchat::utils::storage::StorageContext) -> Result<(), anchorchat::utils::storage::StorageError> {
//! use anchorchat::internal::session::{ChatSession, Message, SessionStore};
//!
//! let store = SessionStore::new(&context);
//! let mut session = ChatSession::new("3f2a", "Greeting");
//! session.messages.push(Message::user("Hi"));
//! store.save_session(&session).await?;
//!
//! let restored = store.load_session("3f2a").await?;
//! # Ok(())
//! # }
//! ```

pub mod index;
pub mod state;
pub mod store;

pub use index::SessionIndexStore;
pub use state::{
    AppSettings, Attachment, ChatSession, DEFAULT_MODEL, Message, Role, SessionId,
    SessionIndexEntry,
};
pub use store::SessionStore;
