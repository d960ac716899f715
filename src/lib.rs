//! anchorchat: chat sessions kept in a local directory or a cloud object
//! store, with streamed model replies and a rolling memory anchor that stands
//! in for replaying the whole conversation.

pub mod cli;
pub mod command;
pub mod internal;
pub mod utils;
