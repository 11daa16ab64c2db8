//! Provider endpoint configuration.
//!
//! Each adapter is built from a [`ProviderConfig`] holding the endpoint base
//! URL, optional API version header, HTTP timeout and the list of models
//! the adapter accepts. Defaults target the public vendor APIs; tests and
//! proxies override `base_url`.

use crate::llm::provider_ids;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Anthropic API version header value.
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Configuration for a single provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Identifier of the provider (e.g. "openai")
    pub provider_id: String,
    /// Base URL without a trailing path (e.g. "https://api.openai.com")
    pub base_url: String,
    /// API version header value, empty when the provider has none
    pub api_version: String,
    /// Whole-request HTTP timeout; `None` means wait until cancelled
    pub timeout: Option<Duration>,
    /// Model used when the caller does not pick one
    pub default_model: String,
    /// Models the adapter accepts
    pub models: Vec<String>,
}

impl ProviderConfig {
    fn builtin(provider_id: &str, base_url: &str, models: &[&str]) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            base_url: base_url.to_string(),
            api_version: String::new(),
            timeout: None,
            default_model: models.first().map(|m| (*m).to_string()).unwrap_or_default(),
            models: models.iter().map(|m| (*m).to_string()).collect(),
        }
    }

    /// Creates the default configuration for OpenAI.
    ///
    /// # Examples
    ///
    /// ```
    /// use chorus::llm::ProviderConfig;
    ///
    /// let config = ProviderConfig::openai();
    /// assert_eq!(config.default_model, "gpt-4o");
    /// ```
    #[must_use]
    pub fn openai() -> Self {
        Self::builtin(
            provider_ids::OPENAI,
            "https://api.openai.com",
            &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"],
        )
    }

    /// Creates the default configuration for Anthropic.
    #[must_use]
    pub fn anthropic() -> Self {
        Self::builtin(
            provider_ids::ANTHROPIC,
            "https://api.anthropic.com",
            &[
                "claude-3-5-sonnet-20241022",
                "claude-3-5-haiku-20241022",
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
            ],
        )
        .with_api_version(ANTHROPIC_API_VERSION)
    }

    /// Creates the default configuration for Grok (xAI).
    #[must_use]
    pub fn grok() -> Self {
        Self::builtin(
            provider_ids::GROK,
            "https://api.x.ai",
            &["grok-beta", "grok-2-1212", "grok-2-vision-1212"],
        )
    }

    /// Creates the default configuration for Google Gemini.
    #[must_use]
    pub fn google() -> Self {
        Self::builtin(
            provider_ids::GOOGLE,
            "https://generativelanguage.googleapis.com",
            &["gemini-1.5-pro", "gemini-1.5-flash", "gemini-1.0-pro"],
        )
    }

    /// Returns the default configuration for a built-in provider id.
    #[must_use]
    pub fn for_provider(provider_id: &str) -> Option<Self> {
        match provider_id {
            provider_ids::OPENAI => Some(Self::openai()),
            provider_ids::ANTHROPIC => Some(Self::anthropic()),
            provider_ids::GROK => Some(Self::grok()),
            provider_ids::GOOGLE => Some(Self::google()),
            _ => None,
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API version header value.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the default model, adding it to the model list if missing.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !self.models.contains(&model) {
            self.models.push(model.clone());
        }
        self.default_model = model;
        self
    }

    /// Replaces the accepted model list.
    ///
    /// If the current default is not in the new list, the first entry becomes the default.
    #[must_use]
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        if !self.models.contains(&self.default_model) {
            if let Some(first) = self.models.first() {
                self.default_model = first.clone();
            }
        }
        self
    }

    /// Returns true if the adapter accepts the given model.
    #[must_use]
    pub fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Joins a path onto the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
