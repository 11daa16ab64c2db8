//! Grok (xAI) adapter.
//!
//! xAI exposes the chat-completions protocol, so this adapter reuses the
//! OpenAI wire format against `https://api.x.ai`.

use crate::error::{CoreError, CoreResult};
use crate::llm::capability::capabilities;
use crate::llm::client::{check_request, failed_stream, ChatRequest, FrameStream, ProviderClient};
use crate::llm::config::ProviderConfig;
use crate::llm::openai::{chat_delta, ChatCompletionsApi};
use async_trait::async_trait;

/// Adapter for the xAI Grok API.
#[derive(Debug, Clone)]
pub struct GrokClient {
    api: ChatCompletionsApi,
}

impl GrokClient {
    /// Human-readable provider name.
    pub const NAME: &'static str = "Grok";

    /// Creates a new Grok adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ProviderConfig) -> CoreResult<Self> {
        Ok(Self {
            api: ChatCompletionsApi::new(config, Self::NAME, chat_delta)?,
        })
    }

    /// Returns the adapter configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        self.api.config()
    }
}

#[async_trait]
impl ProviderClient for GrokClient {
    fn provider_name(&self) -> &str {
        Self::NAME
    }

    fn available_models(&self) -> Vec<String> {
        self.api.config().models.clone()
    }

    fn default_model(&self) -> String {
        self.api.config().default_model.clone()
    }

    fn supports_streaming(&self) -> bool {
        capabilities(&self.api.config().provider_id).is_some_and(|c| c.supports_streaming)
    }

    async fn send_message(&self, request: ChatRequest) -> CoreResult<String> {
        check_request(self, &request)?;
        self.api.send(request).await
    }

    async fn validate_credential(&self, credential: &str) -> CoreResult<bool> {
        if credential.trim().is_empty() {
            return Err(CoreError::missing_credential(Self::NAME));
        }
        self.api.validate(credential).await
    }

    fn stream_message(&self, request: ChatRequest) -> FrameStream {
        if let Err(error) = check_request(self, &request) {
            return failed_stream(error);
        }
        self.api.stream(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::messages::ConversationMessage;
    use futures::StreamExt;

    #[test]
    fn defaults_target_xai() {
        let client = GrokClient::new(ProviderConfig::grok()).unwrap();
        assert_eq!(client.provider_name(), "Grok");
        assert_eq!(client.config().base_url, "https://api.x.ai");
        assert_eq!(client.default_model(), "grok-beta");
        assert!(client.supports_streaming());
    }

    #[tokio::test]
    async fn unknown_model_fails_stream_before_request() {
        let client = GrokClient::new(ProviderConfig::grok()).unwrap();
        let request = ChatRequest::new(vec![ConversationMessage::user("hi")], "xai-key", "gpt-4o");
        let frames: Vec<_> = client.stream_message(request).collect().await;

        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].error.as_ref().map(|e| e.kind),
            Some(ErrorKind::ProviderError)
        );
    }
}
