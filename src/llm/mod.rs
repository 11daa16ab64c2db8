//! Provider adapters and the plumbing they share.
//!
//! Every vendor API sits behind the [`ProviderClient`] trait. Adapters are
//! resolved by provider id through a [`ClientFactory`], speak HTTP through
//! `reqwest`, and turn server-sent event bodies into lazy [`FrameStream`]s
//! via the [`FrameParser`].

mod anthropic;
mod capability;
mod client;
mod config;
mod factory;
mod google;
mod grok;
mod http;
mod openai;
mod sse;
mod streaming;

/// Identifiers of the built-in providers.
pub mod provider_ids {
    /// OpenAI chat completions
    pub const OPENAI: &str = "openai";
    /// Anthropic messages
    pub const ANTHROPIC: &str = "anthropic";
    /// xAI Grok chat completions
    pub const GROK: &str = "grok";
    /// Google Gemini generateContent
    pub const GOOGLE: &str = "google";

    /// Every built-in id, in display order.
    pub const BUILTIN: [&str; 4] = [OPENAI, ANTHROPIC, GROK, GOOGLE];
}

pub use anthropic::{AnthropicClient, DEFAULT_MAX_TOKENS};
pub use capability::{capabilities, Capabilities};
pub use client::{
    check_request, failed_stream, ChatRequest, FrameStream, ProviderClient, StreamFrame,
};
pub use config::{ProviderConfig, ANTHROPIC_API_VERSION};
pub use factory::{ClientConstructor, ClientFactory};
pub use google::GoogleClient;
pub use grok::GrokClient;
pub use http::classify_status;
pub use openai::OpenAIClient;
pub use sse::{frame_stream, Delta, DeltaExtractor, FrameParser, DATA_PREFIX, DONE_SENTINEL};
pub use streaming::{StreamAccumulator, MISSING_TERMINAL_FRAME};
