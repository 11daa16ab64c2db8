//! Conversation data model exchanged between callers and the client layer.
//!
//! Callers own the conversation; the core only reads the messages it is
//! handed and returns transient reply placeholders for the caller to store.

mod types;

pub use types::*;
