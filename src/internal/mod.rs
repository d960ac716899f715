//! Internal layer exports for model access, configuration, turn orchestration and session persistence.

pub mod ai;
pub mod config;
pub mod conversation;
pub mod session;
