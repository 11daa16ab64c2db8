//! Static per-provider capability descriptors.
//!
//! Callers consult these to decide UI affordances (for example hiding a
//! streaming toggle). Adapters report from the same table, so a row that
//! claims streaming always has a real streaming path behind it.

use crate::llm::provider_ids;

/// Static facts about a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Replies can be received incrementally
    pub supports_streaming: bool,
    /// System instructions are accepted
    pub supports_system_messages: bool,
    /// Largest context window across the provider's known models, in tokens
    pub max_context_length: u32,
    /// Function calling is offered by the provider
    pub supports_function_calling: Option<bool>,
    /// Image input is offered by the provider
    pub supports_vision: Option<bool>,
    /// Tool use is offered by the provider
    pub supports_tools: Option<bool>,
}

const OPENAI: Capabilities = Capabilities {
    supports_streaming: true,
    supports_system_messages: true,
    max_context_length: 128_000,
    supports_function_calling: Some(true),
    supports_vision: Some(true),
    supports_tools: Some(true),
};

const ANTHROPIC: Capabilities = Capabilities {
    supports_streaming: true,
    supports_system_messages: true,
    max_context_length: 200_000,
    supports_function_calling: Some(false),
    supports_vision: Some(true),
    supports_tools: Some(true),
};

const GROK: Capabilities = Capabilities {
    supports_streaming: true,
    supports_system_messages: true,
    max_context_length: 131_072,
    supports_function_calling: Some(true),
    supports_vision: Some(false),
    supports_tools: Some(true),
};

const GOOGLE: Capabilities = Capabilities {
    supports_streaming: true,
    supports_system_messages: true,
    max_context_length: 1_048_576,
    supports_function_calling: Some(true),
    supports_vision: Some(true),
    supports_tools: Some(true),
};

/// Returns the capability row for a provider id, if it is a built-in provider.
#[must_use]
pub fn capabilities(provider_id: &str) -> Option<&'static Capabilities> {
    match provider_id {
        provider_ids::OPENAI => Some(&OPENAI),
        provider_ids::ANTHROPIC => Some(&ANTHROPIC),
        provider_ids::GROK => Some(&GROK),
        provider_ids::GOOGLE => Some(&GOOGLE),
        _ => None,
    }
}
