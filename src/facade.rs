//! High-level facade for chorus.
//!
//! [`Chorus`] ties the credential store, the client factory and the
//! adapters together behind one call. It is the only place that decides
//! between the streaming and the blocking path, and the only place where
//! push callbacks exist; everything below it is pull-based.
//!
//! # Example
//!
//! ```rust,ignore
//! use chorus::prelude::*;
//!
//! let chorus = Chorus::with_defaults();
//! chorus.set_credential("openai", &key)?;
//!
//! let mut callbacks = StreamCallbacks::new(|token| print!("{token}"));
//! let reply = chorus
//!     .send_message(
//!         &[ConversationMessage::user("Hello")],
//!         &Participant::new("openai", "gpt-4o"),
//!         None,
//!         Some(&mut callbacks),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! ```

use crate::config::ProvidersConfig;
use crate::credentials::{CredentialStore, CredentialValidator};
use crate::error::{CoreError, CoreResult, StorageError};
use crate::llm::{
    capabilities, provider_ids, Capabilities, ChatRequest, ClientFactory, ProviderClient,
    StreamAccumulator,
};
use crate::messages::{ConversationMessage, GenerationSettings};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Type alias for token callbacks.
type TokenCallback = Box<dyn FnMut(&str) + Send + 'static>;

/// Type alias for completion callbacks, called with the full reply text.
type CompleteCallback = Box<dyn FnMut(&str) + Send + 'static>;

/// Type alias for error callbacks.
type ErrorCallback = Box<dyn FnMut(&CoreError) + Send + 'static>;

/// Push callbacks for a streamed reply.
///
/// Supplying callbacks asks for the streaming path; the facade falls back to
/// the blocking path when the adapter cannot stream, in which case only
/// `on_complete` or `on_error` fires.
pub struct StreamCallbacks {
    on_token: TokenCallback,
    on_complete: Option<CompleteCallback>,
    on_error: Option<ErrorCallback>,
}

impl std::fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

impl StreamCallbacks {
    /// Creates callbacks that receive each token as it arrives.
    #[must_use]
    pub fn new<F>(on_token: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        Self {
            on_token: Box::new(on_token),
            on_complete: None,
            on_error: None,
        }
    }

    /// Sets a callback for the completed reply text.
    #[must_use]
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Sets a callback for the terminal error.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&CoreError) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    fn token(&mut self, token: &str) {
        (self.on_token)(token);
    }

    fn complete(&mut self, text: &str) {
        if let Some(ref mut on_complete) = self.on_complete {
            on_complete(text);
        }
    }

    fn error(&mut self, error: &CoreError) {
        if let Some(ref mut on_error) = self.on_error {
            on_error(error);
        }
    }
}

/// The provider and model a reply is requested from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Provider id, e.g. "openai"
    pub provider_id: String,
    /// Model id; empty selects the adapter's default model
    #[serde(default)]
    pub model: String,
    /// Generation settings for this participant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<GenerationSettings>,
}

impl Participant {
    /// Creates a participant without generation settings.
    #[must_use]
    pub fn new(provider_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model: model.into(),
            settings: None,
        }
    }

    /// Sets the generation settings.
    #[must_use]
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// Orchestrates one conversation turn across providers.
#[derive(Debug, Clone)]
pub struct Chorus {
    factory: Arc<ClientFactory>,
    credentials: Arc<CredentialStore>,
    validator: CredentialValidator,
    /// Keys read from the environment; used after the store, never persisted
    environment: HashMap<String, String>,
}

impl Chorus {
    /// Creates a facade over an existing factory and credential store.
    #[must_use]
    pub fn new(factory: Arc<ClientFactory>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            validator: CredentialValidator::new(Arc::clone(&factory)),
            factory,
            credentials,
            environment: HashMap::new(),
        }
    }

    /// Creates a facade with the built-in providers and an in-memory store.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(ClientFactory::with_defaults()),
            Arc::new(CredentialStore::in_memory()),
        )
    }

    /// Reads each built-in provider's API key from its environment variables.
    ///
    /// Environment keys are only consulted when the store has no entry and
    /// are never written to the store.
    #[must_use]
    pub fn with_environment_credentials(mut self, providers: &ProvidersConfig) -> Self {
        for id in provider_ids::BUILTIN {
            if let Some(key) = providers.resolve_api_key(id) {
                tracing::debug!(provider = %id, "Credential found in environment");
                self.environment.insert(id.to_string(), key);
            }
        }
        self
    }

    /// Returns the client factory.
    #[must_use]
    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    /// Returns the credential store.
    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Stores a provider credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage tier cannot be written.
    pub fn set_credential(&self, provider_id: &str, credential: &str) -> Result<(), StorageError> {
        self.credentials.set(provider_id, credential)
    }

    /// Removes a stored provider credential, returning whether one was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage tier cannot be written.
    pub fn remove_credential(&self, provider_id: &str) -> Result<bool, StorageError> {
        self.credentials.remove(provider_id)
    }

    /// Returns true if a credential is available for the provider.
    #[must_use]
    pub fn has_credential(&self, provider_id: &str) -> bool {
        self.credential_for(provider_id, None).is_some()
    }

    /// Checks a credential against its provider.
    ///
    /// Without an explicit credential the available one is checked. Never
    /// fails; anything that goes wrong is reported as `false`.
    pub async fn validate_credential(&self, provider_id: &str, credential: Option<&str>) -> bool {
        match self.credential_for(provider_id, credential) {
            Some(credential) => self.validator.validate(provider_id, &credential).await,
            None => false,
        }
    }

    /// Returns the static capabilities of a built-in provider.
    #[must_use]
    pub fn capabilities(&self, provider_id: &str) -> Option<&'static Capabilities> {
        capabilities(provider_id)
    }

    /// Returns the models a provider's adapter accepts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProvider` if the provider is not registered.
    pub fn available_models(&self, provider_id: &str) -> CoreResult<Vec<String>> {
        Ok(self.factory.get_client(provider_id)?.available_models())
    }

    /// Returns every registered provider id, sorted.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<String> {
        self.factory.provider_ids()
    }

    fn credential_for(&self, provider_id: &str, supplied: Option<&str>) -> Option<String> {
        supplied
            .map(str::trim)
            .filter(|credential| !credential.is_empty())
            .map(str::to_string)
            .or_else(|| self.credentials.get(provider_id))
            .or_else(|| self.environment.get(provider_id).cloned())
    }

    /// Requests the next reply from a participant.
    ///
    /// Resolution order:
    /// 1. An empty provider id fails with `InvalidProvider`.
    /// 2. The credential is the supplied one, else the stored one, else the
    ///    environment's; none fails with `MissingCredential`.
    /// 3. The adapter is resolved through the factory.
    /// 4. The streaming path is used when callbacks are supplied and the
    ///    adapter supports streaming, the blocking path otherwise.
    /// 5. The reply becomes a completed assistant message.
    ///
    /// # Errors
    ///
    /// Every failure is a [`CoreError`] whose `offending_message` holds the
    /// failed placeholder: status `Error`, the kind's sentence as `error`,
    /// and any partial text streamed before the failure.
    pub async fn send_message(
        &self,
        messages: &[ConversationMessage],
        participant: &Participant,
        credential: Option<&str>,
        mut callbacks: Option<&mut StreamCallbacks>,
        cancellation: CancellationToken,
    ) -> CoreResult<ConversationMessage> {
        let mut placeholder =
            ConversationMessage::placeholder(&participant.provider_id, &participant.model);

        let outcome = self
            .dispatch(
                messages,
                participant,
                credential,
                callbacks.as_deref_mut(),
                cancellation,
                &mut placeholder,
            )
            .await;

        match outcome {
            Ok(text) => {
                if let Some(callbacks) = callbacks {
                    callbacks.complete(&text);
                }
                Ok(placeholder.completed(text))
            }
            Err(error) => {
                tracing::warn!(
                    provider = %participant.provider_id,
                    model = placeholder.model_id.as_deref().unwrap_or_default(),
                    kind = %error.kind,
                    error = %error.message,
                    "Message failed"
                );
                if let Some(callbacks) = callbacks {
                    callbacks.error(&error);
                }
                let failed = placeholder.failed(error.explanation());
                Err(error.with_offending_message(failed))
            }
        }
    }

    async fn dispatch(
        &self,
        messages: &[ConversationMessage],
        participant: &Participant,
        credential: Option<&str>,
        callbacks: Option<&mut StreamCallbacks>,
        cancellation: CancellationToken,
        placeholder: &mut ConversationMessage,
    ) -> CoreResult<String> {
        let provider_id = participant.provider_id.as_str();
        if provider_id.is_empty() {
            return Err(CoreError::invalid_provider(provider_id));
        }

        let credential = self
            .credential_for(provider_id, credential)
            .ok_or_else(|| CoreError::missing_credential(provider_id))?;

        let client = self.factory.get_client(provider_id)?;

        let model = if participant.model.is_empty() {
            client.default_model()
        } else {
            participant.model.clone()
        };
        placeholder.model_id = Some(model.clone());

        let mut request = ChatRequest::new(messages.to_vec(), credential, model.clone())
            .with_cancellation(cancellation);
        if let Some(settings) = participant.settings {
            request = request.with_settings(settings);
        }

        let streamed = callbacks.is_some() && client.supports_streaming();
        tracing::debug!(
            provider = %provider_id,
            model = %model,
            messages = messages.len(),
            streamed,
            "Dispatching message"
        );

        let text = match callbacks {
            Some(callbacks) if streamed => {
                stream_reply(client.as_ref(), request, callbacks, placeholder).await?
            }
            _ => client.send_message(request).await?,
        };

        tracing::info!(
            provider = %provider_id,
            model = %model,
            chars = text.len(),
            streamed,
            "Message completed"
        );
        Ok(text)
    }
}

/// Drives a frame stream, forwarding tokens to the callbacks.
///
/// Partial text is copied onto the placeholder so a failed reply keeps it.
async fn stream_reply(
    client: &dyn ProviderClient,
    request: ChatRequest,
    callbacks: &mut StreamCallbacks,
    placeholder: &mut ConversationMessage,
) -> CoreResult<String> {
    let mut stream = client.stream_message(request);
    let mut accumulator = StreamAccumulator::new();

    while let Some(frame) = stream.next().await {
        if let Some(token) = frame.token.as_deref() {
            callbacks.token(token);
        }
        if accumulator.push(&frame) {
            break;
        }
    }

    placeholder.text = accumulator.content().to_string();
    accumulator.into_result()
}
