//! Utilities module aggregator exposing storage, attachment upload, and testing helpers.

pub mod storage;
pub mod upload;
