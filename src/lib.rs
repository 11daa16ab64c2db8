//! # Chorus: one chat contract over many providers
//!
//! Chorus sends a conversation to OpenAI, Anthropic, Grok or Google Gemini
//! through a single interface and hands back either the complete reply or
//! a lazy stream of tokens, with cooperative cancellation and one error
//! taxonomy for every provider.
//!
//! ## Architecture
//!
//! - **Facade**: [`facade::Chorus`] resolves credentials and adapters and
//!   decides between streaming and blocking delivery
//! - **Adapters**: one [`llm::ProviderClient`] per vendor wire protocol
//! - **Factory**: [`llm::ClientFactory`] builds each adapter once per id
//! - **Frame parser**: [`llm::FrameParser`] turns server-sent event bodies
//!   into [`llm::StreamFrame`]s
//! - **Credentials**: [`credentials::CredentialStore`] mirrored to a
//!   persistent, session or no storage tier
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chorus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CoreError> {
//!     let chorus = Chorus::with_defaults();
//!     let reply = chorus
//!         .send_message(
//!             &[ConversationMessage::user("Hello!")],
//!             &Participant::new("anthropic", ""),
//!             Some(&api_key),
//!             None,
//!             CancellationToken::new(),
//!         )
//!         .await?;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod facade;
pub mod llm;
pub mod logging;
pub mod messages;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ChorusConfig;
    pub use crate::credentials::{CredentialStore, CredentialValidator, StorageTier};
    pub use crate::error::{CoreError, CoreResult, ErrorKind};
    pub use crate::facade::{Chorus, Participant, StreamCallbacks};
    pub use crate::llm::{
        capabilities, ChatRequest, ClientFactory, FrameStream, ProviderClient, StreamFrame,
    };
    pub use crate::messages::*;
    pub use crate::types::MessageId;

    pub use tokio_util::sync::CancellationToken;
}
