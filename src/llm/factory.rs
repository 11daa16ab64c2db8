//! Provider adapter registry with memoized construction.
//!
//! A [`ClientFactory`] maps provider ids to constructors and builds each
//! adapter at most once, handing out shared `Arc`s afterwards. Factories are
//! plain values owned by the caller; tests build fresh ones.

use crate::config::ProvidersConfig;
use crate::error::{ConfigError, CoreError, CoreResult};
use crate::llm::anthropic::AnthropicClient;
use crate::llm::client::ProviderClient;
use crate::llm::config::ProviderConfig;
use crate::llm::google::GoogleClient;
use crate::llm::grok::GrokClient;
use crate::llm::openai::OpenAIClient;
use crate::llm::provider_ids;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Builds an adapter on first use.
pub type ClientConstructor = Arc<dyn Fn() -> CoreResult<Arc<dyn ProviderClient>> + Send + Sync>;

/// Builds a built-in adapter from its endpoint configuration.
type BuiltinAdapter = fn(ProviderConfig) -> CoreResult<Arc<dyn ProviderClient>>;

fn openai(config: ProviderConfig) -> CoreResult<Arc<dyn ProviderClient>> {
    Ok(Arc::new(OpenAIClient::new(config)?))
}

fn anthropic(config: ProviderConfig) -> CoreResult<Arc<dyn ProviderClient>> {
    Ok(Arc::new(AnthropicClient::new(config)?))
}

fn grok(config: ProviderConfig) -> CoreResult<Arc<dyn ProviderClient>> {
    Ok(Arc::new(GrokClient::new(config)?))
}

fn google(config: ProviderConfig) -> CoreResult<Arc<dyn ProviderClient>> {
    Ok(Arc::new(GoogleClient::new(config)?))
}

/// Adapter constructors for the built-in provider ids.
const BUILTIN_ADAPTERS: [(&str, BuiltinAdapter); 4] = [
    (provider_ids::OPENAI, openai),
    (provider_ids::ANTHROPIC, anthropic),
    (provider_ids::GROK, grok),
    (provider_ids::GOOGLE, google),
];

fn builtin_adapter(provider_id: &str) -> Option<BuiltinAdapter> {
    BUILTIN_ADAPTERS
        .iter()
        .find(|(id, _)| *id == provider_id)
        .map(|(_, build)| *build)
}

/// Registry of provider constructors and the adapters built from them.
#[derive(Default)]
pub struct ClientFactory {
    constructors: RwLock<HashMap<String, ClientConstructor>>,
    clients: RwLock<HashMap<String, Arc<dyn ProviderClient>>>,
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("providers", &self.provider_ids())
            .field("constructed", &self.constructed_ids())
            .finish()
    }
}

impl ClientFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory with the four built-in providers at their default endpoints.
    #[must_use]
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        for id in provider_ids::BUILTIN {
            if let Some(config) = ProviderConfig::for_provider(id) {
                factory.register_config(config);
            }
        }
        factory
    }

    /// Creates a factory with the built-in providers, applying configured overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider's overrides are invalid.
    pub fn with_builtin_providers(providers: &ProvidersConfig) -> Result<Self, ConfigError> {
        let factory = Self::new();
        for id in provider_ids::BUILTIN {
            factory.register_config(providers.resolve(id)?);
        }
        Ok(factory)
    }

    /// Registers the built-in adapter for a configuration's provider id.
    ///
    /// Returns false when the id has no built-in adapter.
    pub fn register_config(&self, config: ProviderConfig) -> bool {
        let Some(build) = builtin_adapter(&config.provider_id) else {
            return false;
        };
        let id = config.provider_id.clone();
        self.register_shared_constructor(id, Arc::new(move || build(config.clone())));
        true
    }

    /// Registers a constructor for a provider id.
    ///
    /// Replaces any previous constructor and drops an adapter already built
    /// from it, so the next `get_client` uses the new constructor.
    pub fn register_constructor<F>(&self, provider_id: impl Into<String>, constructor: F)
    where
        F: Fn() -> CoreResult<Arc<dyn ProviderClient>> + Send + Sync + 'static,
    {
        self.register_shared_constructor(provider_id.into(), Arc::new(constructor));
    }

    fn register_shared_constructor(&self, provider_id: String, constructor: ClientConstructor) {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&provider_id);
        self.constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider_id, constructor);
    }

    /// Installs an adapter directly, replacing any memoized one.
    ///
    /// The id does not need a constructor; this is how custom adapters and
    /// test doubles are added.
    pub fn register_client(&self, provider_id: impl Into<String>, client: Arc<dyn ProviderClient>) {
        let provider_id = provider_id.into();
        tracing::debug!(
            provider = %provider_id,
            adapter = client.provider_name(),
            "Adapter registered"
        );
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider_id, client);
    }

    /// Returns the adapter for a provider id, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProvider` for an empty or unregistered id, or the
    /// constructor's error.
    pub fn get_client(&self, provider_id: &str) -> CoreResult<Arc<dyn ProviderClient>> {
        if provider_id.is_empty() {
            return Err(CoreError::invalid_provider(provider_id));
        }

        if let Some(client) = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_id)
        {
            return Ok(Arc::clone(client));
        }

        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_id)
            .cloned()
            .ok_or_else(|| CoreError::invalid_provider(provider_id))?;

        // No lock is held here; constructors may resolve other providers.
        let built = constructor()?;

        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        let client = clients
            .entry(provider_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(
                    provider = %provider_id,
                    adapter = built.provider_name(),
                    "Adapter constructed"
                );
                built
            });
        Ok(Arc::clone(client))
    }

    /// Returns true if the id has a constructor or an installed adapter.
    #[must_use]
    pub fn is_registered(&self, provider_id: &str) -> bool {
        let has_constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(provider_id);
        if has_constructor {
            return true;
        }
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(provider_id)
    }

    /// Returns every registered provider id, sorted.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        for id in self.constructed_ids() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids.sort();
        ids
    }

    fn constructed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::llm::client::ChatRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug)]
    struct Fixed(&'static str);

    #[async_trait]
    impl ProviderClient for Fixed {
        fn provider_name(&self) -> &str {
            self.0
        }

        fn available_models(&self) -> Vec<String> {
            vec!["m".to_string()]
        }

        fn default_model(&self) -> String {
            "m".to_string()
        }

        fn supports_streaming(&self) -> bool {
            false
        }

        async fn send_message(&self, _request: ChatRequest) -> CoreResult<String> {
            Ok(self.0.to_string())
        }

        async fn validate_credential(&self, _credential: &str) -> CoreResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn get_client_is_memoized() {
        let factory = ClientFactory::with_defaults();
        let first = factory.get_client("openai").unwrap();
        let second = factory.get_client("openai").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.provider_name(), "OpenAI");
    }

    #[test]
    fn constructor_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = ClientFactory::new();
        let counter = Arc::clone(&calls);
        factory.register_constructor("custom", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Fixed("Custom")) as Arc<dyn ProviderClient>)
        });

        factory.get_client("custom").unwrap();
        factory.get_client("custom").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_and_empty_ids_are_invalid_provider() {
        let factory = ClientFactory::with_defaults();
        assert_eq!(
            factory.get_client("mistral").unwrap_err().kind,
            ErrorKind::InvalidProvider
        );
        assert_eq!(
            factory.get_client("").unwrap_err().kind,
            ErrorKind::InvalidProvider
        );
    }

    #[test]
    fn register_client_overrides_memoized_adapter() {
        let factory = ClientFactory::with_defaults();
        let original = factory.get_client("grok").unwrap();

        let replacement: Arc<dyn ProviderClient> = Arc::new(Fixed("Stub"));
        factory.register_client("grok", Arc::clone(&replacement));

        let resolved = factory.get_client("grok").unwrap();
        assert!(Arc::ptr_eq(&resolved, &replacement));
        assert!(!Arc::ptr_eq(&resolved, &original));
    }

    #[test]
    fn register_constructor_replaces_built_adapter() {
        let factory = ClientFactory::with_defaults();
        let _ = factory.get_client("google").unwrap();

        factory.register_constructor("google", || {
            Ok(Arc::new(Fixed("Replacement")) as Arc<dyn ProviderClient>)
        });
        assert_eq!(
            factory.get_client("google").unwrap().provider_name(),
            "Replacement"
        );
    }

    #[test]
    fn constructor_errors_are_not_memoized() {
        let factory = ClientFactory::new();
        factory.register_constructor("broken", || Err(CoreError::unknown("no TLS")));
        assert!(factory.get_client("broken").is_err());
        assert!(factory.get_client("broken").is_err());
    }

    #[test]
    fn provider_ids_are_sorted_and_include_installed_clients() {
        let factory = ClientFactory::with_defaults();
        factory.register_client("zeta", Arc::new(Fixed("Zeta")));
        assert_eq!(
            factory.provider_ids(),
            ["anthropic", "google", "grok", "openai", "zeta"]
        );
        assert!(factory.is_registered("zeta"));
        assert!(!factory.is_registered("mistral"));
    }

    #[test]
    fn register_config_rejects_unknown_provider() {
        let factory = ClientFactory::new();
        let mut config = ProviderConfig::openai();
        config.provider_id = "mistral".to_string();
        assert!(!factory.register_config(config));
    }

    #[test]
    fn every_builtin_id_has_an_adapter() {
        for id in provider_ids::BUILTIN {
            let build = builtin_adapter(id).unwrap();
            let config = ProviderConfig::for_provider(id).unwrap();
            let client = build(config.clone()).unwrap();
            assert_eq!(client.default_model(), config.default_model, "{id}");
        }
        assert!(builtin_adapter("mistral").is_none());
    }

    #[test]
    fn constructor_may_resolve_other_providers() {
        let factory = Arc::new(ClientFactory::with_defaults());
        let inner = Arc::downgrade(&factory);
        factory.register_constructor("alias", move || {
            let factory = inner
                .upgrade()
                .ok_or_else(|| CoreError::unknown("factory dropped"))?;
            assert!(factory.is_registered("openai"));
            factory.get_client("openai")
        });

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(&factory);
        thread::spawn(move || {
            let _ = tx.send(worker.get_client("alias"));
        });
        let alias = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("get_client blocked while constructing an alias")
            .unwrap();

        let openai = factory.get_client("openai").unwrap();
        assert!(Arc::ptr_eq(&alias, &openai));
        assert!(Arc::ptr_eq(&alias, &factory.get_client("alias").unwrap()));
    }

    #[test]
    fn register_config_uses_overrides() {
        let factory = ClientFactory::new();
        factory.register_config(ProviderConfig::anthropic().with_models(["claude-test"]));
        let client = factory.get_client("anthropic").unwrap();
        assert_eq!(client.available_models(), ["claude-test"]);
    }
}
