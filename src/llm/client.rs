//! Provider adapter contract.
//!
//! This module defines the `ProviderClient` trait implemented by every
//! provider adapter, the `ChatRequest` it consumes, and the `StreamFrame`
//! sequence produced by the incremental path. The orchestration facade
//! decides between the blocking and streaming paths; adapters never do.

use crate::error::{CoreError, CoreResult};
use crate::messages::{ConversationMessage, GenerationSettings};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// One unit of an incremental reply.
///
/// Non-terminal frames carry a token. The terminal frame has `done = true`
/// and carries an error when the stream failed or was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// True for the final frame of a stream
    pub done: bool,
    /// Incremental text
    pub token: Option<String>,
    /// Failure that ended the stream
    pub error: Option<CoreError>,
}

impl StreamFrame {
    /// Creates a non-terminal token frame.
    #[must_use]
    pub fn token(text: impl Into<String>) -> Self {
        Self {
            done: false,
            token: Some(text.into()),
            error: None,
        }
    }

    /// Creates a successful terminal frame.
    #[must_use]
    pub fn done() -> Self {
        Self {
            done: true,
            token: None,
            error: None,
        }
    }

    /// Creates a terminal frame carrying an error.
    #[must_use]
    pub fn failed(error: CoreError) -> Self {
        Self {
            done: true,
            token: None,
            error: Some(error),
        }
    }

    /// Returns true if this is a terminal frame carrying an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.done && self.error.is_some()
    }
}

/// Lazy, finite, non-restartable sequence of frames.
///
/// Always ends with exactly one frame where `done` is true.
pub type FrameStream = Pin<Box<dyn Stream<Item = StreamFrame> + Send>>;

/// Everything an adapter needs to issue one chat call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The conversation, oldest first
    pub messages: Vec<ConversationMessage>,
    /// The provider credential
    pub credential: String,
    /// The model identifier
    pub model: String,
    /// Optional generation settings
    pub settings: Option<GenerationSettings>,
    /// Token that aborts the call when cancelled
    pub cancellation: CancellationToken,
}

impl ChatRequest {
    /// Creates a request with no settings and a token that is never cancelled.
    #[must_use]
    pub fn new(
        messages: Vec<ConversationMessage>,
        credential: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            credential: credential.into(),
            model: model.into(),
            settings: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Sets the generation settings.
    #[must_use]
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Trait implemented by every provider adapter.
///
/// Adapters are stateless apart from their static configuration and a
/// shared HTTP client, so one instance serves concurrent calls.
///
/// # Example
///
/// ```ignore
/// use chorus::llm::{ChatRequest, OpenAIClient, ProviderClient, ProviderConfig};
/// use chorus::messages::ConversationMessage;
///
/// let client = OpenAIClient::new(ProviderConfig::openai())?;
/// let request = ChatRequest::new(vec![ConversationMessage::user("Hello")], key, "gpt-4o");
/// let reply = client.send_message(request).await?;
/// ```
#[async_trait]
pub trait ProviderClient: Send + Sync + std::fmt::Debug {
    /// Returns the human-readable provider name.
    fn provider_name(&self) -> &str;

    /// Returns the models this adapter accepts.
    fn available_models(&self) -> Vec<String>;

    /// Returns the model used when the caller does not choose one.
    fn default_model(&self) -> String;

    /// Returns true if `stream_message` has a real incremental path.
    fn supports_streaming(&self) -> bool;

    /// Sends the conversation and returns the complete reply text.
    ///
    /// # Errors
    ///
    /// Fails with `MissingCredential` for an empty credential and with
    /// `ProviderError` for an unknown model, both before any network call.
    /// HTTP failures map through the shared status table.
    async fn send_message(&self, request: ChatRequest) -> CoreResult<String>;

    /// Performs the cheapest authenticated call to check a credential.
    ///
    /// # Errors
    ///
    /// Returns an error when the check itself could not be completed.
    async fn validate_credential(&self, credential: &str) -> CoreResult<bool>;

    /// Sends the conversation and returns the reply as a lazy frame stream.
    ///
    /// The default implementation is for adapters without a streaming path.
    fn stream_message(&self, _request: ChatRequest) -> FrameStream {
        failed_stream(CoreError::provider(format!(
            "streaming is not supported by {}",
            self.provider_name()
        )))
    }
}

/// Returns a stream consisting of a single terminal error frame.
#[must_use]
pub fn failed_stream(error: CoreError) -> FrameStream {
    Box::pin(futures::stream::once(async move {
        StreamFrame::failed(error)
    }))
}

/// Checks the preconditions shared by every adapter before any network call.
///
/// # Errors
///
/// Returns `MissingCredential` for an empty credential and `ProviderError`
/// for a model the adapter does not list.
pub fn check_request(client: &dyn ProviderClient, request: &ChatRequest) -> CoreResult<()> {
    if request.credential.trim().is_empty() {
        return Err(CoreError::missing_credential(client.provider_name()));
    }
    if !client.available_models().iter().any(|m| m == &request.model) {
        return Err(CoreError::unsupported_model(
            client.provider_name(),
            &request.model,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use futures::StreamExt;

    #[derive(Debug)]
    struct BlockingOnly;

    #[async_trait]
    impl ProviderClient for BlockingOnly {
        fn provider_name(&self) -> &str {
            "Blocking"
        }

        fn available_models(&self) -> Vec<String> {
            vec!["m1".to_string()]
        }

        fn default_model(&self) -> String {
            "m1".to_string()
        }

        fn supports_streaming(&self) -> bool {
            false
        }

        async fn send_message(&self, request: ChatRequest) -> CoreResult<String> {
            check_request(self, &request)?;
            Ok("ok".to_string())
        }

        async fn validate_credential(&self, _credential: &str) -> CoreResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn frame_constructors() {
        let token = StreamFrame::token("Hel");
        assert!(!token.done);
        assert_eq!(token.token.as_deref(), Some("Hel"));

        assert!(StreamFrame::done().done);
        assert!(!StreamFrame::done().is_error());
        assert!(StreamFrame::failed(CoreError::cancelled()).is_error());
    }

    #[tokio::test]
    async fn default_stream_is_single_terminal_error() {
        let request = ChatRequest::new(vec![], "key", "m1");
        let frames: Vec<_> = BlockingOnly.stream_message(request).collect().await;

        assert_eq!(frames.len(), 1);
        assert!(frames[0].done);
        assert_eq!(
            frames[0].error.as_ref().map(|e| e.kind),
            Some(ErrorKind::ProviderError)
        );
    }

    #[tokio::test]
    async fn check_request_rejects_blank_credential() {
        let request = ChatRequest::new(vec![ConversationMessage::user("hi")], "  ", "m1");
        let error = BlockingOnly.send_message(request).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::MissingCredential);
    }

    #[tokio::test]
    async fn check_request_rejects_unknown_model() {
        let request = ChatRequest::new(vec![ConversationMessage::user("hi")], "key", "m2");
        let error = BlockingOnly.send_message(request).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::ProviderError);
        assert!(error.message.contains("m2"));
    }

    #[test]
    fn request_builder() {
        let token = CancellationToken::new();
        let request = ChatRequest::new(vec![], "key", "m1")
            .with_settings(GenerationSettings::new().with_temperature(0.2))
            .with_cancellation(token.clone());
        token.cancel();
        assert!(request.cancellation.is_cancelled());
        assert_eq!(request.settings.and_then(|s| s.temperature), Some(0.2));
    }
}
