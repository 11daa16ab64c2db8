//! Identity types shared across the crate.

mod message_id;

pub use message_id::{InvalidMessageId, MessageId};
