//! Configuration types.
//!
//! The file only holds overrides; every provider starts from its built-in
//! [`ProviderConfig`] and the fields present here replace the defaults.

use crate::credentials::StorageTier;
use crate::error::ConfigError;
use crate::llm::{provider_ids, ProviderConfig};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration structure for chorus.
///
/// This structure maps directly to the TOML configuration file format:
///
/// ```toml
/// default_provider = "anthropic"
/// credential_storage = "session"
///
/// [logging]
/// level = "debug"
///
/// [providers.openai]
/// base_url = "http://localhost:8080"
/// timeout_secs = 60
/// default_model = "gpt-4o-mini"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChorusConfig {
    /// The provider to use when none is specified.
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Where API keys are kept.
    #[serde(default)]
    pub credential_storage: StorageTier,

    /// Diagnostic logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-provider overrides, keyed by provider id.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl ChorusConfig {
    /// Creates a configuration with every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default provider id.
    #[must_use]
    pub fn with_default_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.default_provider = Some(provider_id.into());
        self
    }

    /// Sets the credential storage tier.
    #[must_use]
    pub fn with_credential_storage(mut self, tier: StorageTier) -> Self {
        self.credential_storage = tier;
        self
    }

    /// Adds overrides for a provider.
    #[must_use]
    pub fn with_provider(
        mut self,
        provider_id: impl Into<String>,
        settings: ProviderSettings,
    ) -> Self {
        self.providers.insert(provider_id, settings);
        self
    }

    /// Returns the effective default provider id.
    ///
    /// Returns the explicitly set default, or if exactly one provider
    /// section is present, that provider's id.
    #[must_use]
    pub fn effective_default(&self) -> Option<&str> {
        if let Some(ref id) = self.default_provider {
            return Some(id.as_str());
        }

        if self.providers.len() == 1 {
            return self.providers.ids().next();
        }

        None
    }

    /// Returns the resolved endpoint configuration for a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not a built-in provider or its
    /// overrides are invalid.
    pub fn provider_config(&self, provider_id: &str) -> Result<ProviderConfig, ConfigError> {
        self.providers.resolve(provider_id)
    }

    /// Checks every value that cannot be checked by deserialization alone.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref id) = self.default_provider {
            if !provider_ids::BUILTIN.contains(&id.as_str()) {
                return Err(ConfigError::invalid_value(
                    "default_provider",
                    format!("unknown provider '{id}'"),
                ));
            }
        }

        for id in self.providers.ids() {
            self.providers.resolve(id)?;
        }

        Ok(())
    }
}

/// Overrides for every configured provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvidersConfig {
    entries: BTreeMap<String, ProviderSettings>,
}

impl ProvidersConfig {
    /// Creates an empty set of overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the overrides for a provider.
    pub fn insert(&mut self, provider_id: impl Into<String>, settings: ProviderSettings) {
        self.entries.insert(provider_id.into(), settings);
    }

    /// Returns the overrides for a provider, if any.
    #[must_use]
    pub fn get(&self, provider_id: &str) -> Option<&ProviderSettings> {
        self.entries.get(provider_id)
    }

    /// Returns the ids that have a section, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of provider sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no provider has overrides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges a provider's overrides onto its built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not a built-in provider or an override
    /// is invalid.
    pub fn resolve(&self, provider_id: &str) -> Result<ProviderConfig, ConfigError> {
        let mut config = ProviderConfig::for_provider(provider_id).ok_or_else(|| {
            ConfigError::invalid_value(
                format!("providers.{provider_id}"),
                "not a built-in provider (expected openai, anthropic, grok or google)",
            )
        })?;

        let Some(settings) = self.entries.get(provider_id) else {
            return Ok(config);
        };
        let field = |name: &str| format!("providers.{provider_id}.{name}");

        if let Some(ref models) = settings.models {
            if models.is_empty() {
                return Err(ConfigError::invalid_value(field("models"), "must not be empty"));
            }
            config = config.with_models(models.iter().cloned());
        }

        if let Some(ref model) = settings.default_model {
            if model.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    field("default_model"),
                    "must not be empty",
                ));
            }
            config = config.with_default_model(model.trim());
        }

        if let Some(ref base_url) = settings.base_url {
            validate_base_url(base_url).map_err(|reason| {
                ConfigError::invalid_value(field("base_url"), reason)
            })?;
            config = config.with_base_url(base_url.trim_end_matches('/'));
        }

        if let Some(secs) = settings.timeout_secs {
            if secs == 0 {
                return Err(ConfigError::invalid_value(
                    field("timeout_secs"),
                    "must be greater than zero",
                ));
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }

        if let Some(ref version) = settings.api_version {
            config = config.with_api_version(version.clone());
        }

        Ok(config)
    }

    /// Returns the environment variables checked for a provider's API key, in order.
    ///
    /// A configured `api_key_env` replaces the built-in names.
    #[must_use]
    pub fn api_key_env(&self, provider_id: &str) -> Vec<String> {
        if let Some(name) = self
            .entries
            .get(provider_id)
            .and_then(|settings| settings.api_key_env.as_ref())
        {
            return vec![name.clone()];
        }

        default_api_key_env(provider_id)
            .iter()
            .map(|name| (*name).to_string())
            .collect()
    }

    /// Reads a provider's API key from the environment.
    #[must_use]
    pub fn resolve_api_key(&self, provider_id: &str) -> Option<String> {
        self.api_key_env(provider_id)
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }
}

/// Built-in environment variable names for each provider's API key.
#[must_use]
pub fn default_api_key_env(provider_id: &str) -> &'static [&'static str] {
    match provider_id {
        provider_ids::OPENAI => &["OPENAI_API_KEY"],
        provider_ids::ANTHROPIC => &["ANTHROPIC_API_KEY"],
        provider_ids::GROK => &["XAI_API_KEY"],
        provider_ids::GOOGLE => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        _ => &[],
    }
}

fn validate_base_url(base_url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(base_url).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}', expected http or https")),
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}

/// Overrides for a single provider. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL replacing the vendor endpoint (proxies, mock servers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Whole-request HTTP timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Model used when the caller does not pick one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Models the adapter accepts, replacing the built-in list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,

    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// API version header value (Anthropic only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

impl ProviderSettings {
    /// Creates settings with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Sets the default model.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Replaces the model list.
    #[must_use]
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = Some(models.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the API key environment variable.
    #[must_use]
    pub fn with_api_key_env(mut self, env_var: impl Into<String>) -> Self {
        self.api_key_env = Some(env_var.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigErrorKind;

    #[test]
    fn default_config_resolves_builtins() {
        let config = ChorusConfig::default();
        assert_eq!(config.credential_storage, StorageTier::Persistent);
        for id in provider_ids::BUILTIN {
            assert_eq!(
                config.provider_config(id).unwrap(),
                ProviderConfig::for_provider(id).unwrap()
            );
        }
    }

    #[test]
    fn overrides_are_merged() {
        let config = ChorusConfig::new().with_provider(
            "openai",
            ProviderSettings::new()
                .with_base_url("http://127.0.0.1:9000/")
                .with_timeout_secs(30)
                .with_models(["gpt-4o", "gpt-4o-mini"])
                .with_default_model("gpt-4o-mini"),
        );

        let resolved = config.provider_config("openai").unwrap();
        assert_eq!(resolved.base_url, "http://127.0.0.1:9000");
        assert_eq!(resolved.timeout, Some(Duration::from_secs(30)));
        assert_eq!(resolved.models, ["gpt-4o", "gpt-4o-mini"]);
        assert_eq!(resolved.default_model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let error = ProvidersConfig::new().resolve("mistral").unwrap_err();
        assert!(matches!(
            error.kind,
            ConfigErrorKind::InvalidValue { ref field, .. } if field == "providers.mistral"
        ));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        for url in ["not a url", "ftp://example.com", "https://example.com/?key=1"] {
            let config = ChorusConfig::new()
                .with_provider("grok", ProviderSettings::new().with_base_url(url));
            assert!(config.validate().is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ChorusConfig::new()
            .with_provider("google", ProviderSettings::new().with_timeout_secs(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_default_provider_is_rejected() {
        let config = ChorusConfig::new().with_default_provider("mistral");
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_default_prefers_explicit_value() {
        let config = ChorusConfig::new()
            .with_provider("google", ProviderSettings::new())
            .with_default_provider("anthropic");
        assert_eq!(config.effective_default(), Some("anthropic"));
    }

    #[test]
    fn effective_default_uses_single_section() {
        let config = ChorusConfig::new().with_provider("grok", ProviderSettings::new());
        assert_eq!(config.effective_default(), Some("grok"));

        let config = config.with_provider("openai", ProviderSettings::new());
        assert_eq!(config.effective_default(), None);
    }

    #[test]
    fn api_key_env_defaults_and_override() {
        let mut providers = ProvidersConfig::new();
        assert_eq!(providers.api_key_env("google"), ["GEMINI_API_KEY", "GOOGLE_API_KEY"]);

        providers.insert("google", ProviderSettings::new().with_api_key_env("MY_GEMINI"));
        assert_eq!(providers.api_key_env("google"), ["MY_GEMINI"]);
        assert!(providers.api_key_env("mistral").is_empty());
    }

    #[test]
    fn resolve_api_key_reads_environment() {
        let mut providers = ProvidersConfig::new();
        providers.insert(
            "anthropic",
            ProviderSettings::new().with_api_key_env("CHORUS_TEST_TYPES_ANTHROPIC_KEY"),
        );

        std::env::set_var("CHORUS_TEST_TYPES_ANTHROPIC_KEY", "  sk-ant-env  ");
        assert_eq!(providers.resolve_api_key("anthropic").as_deref(), Some("sk-ant-env"));

        std::env::set_var("CHORUS_TEST_TYPES_ANTHROPIC_KEY", "   ");
        assert!(providers.resolve_api_key("anthropic").is_none());
        std::env::remove_var("CHORUS_TEST_TYPES_ANTHROPIC_KEY");
    }
}
