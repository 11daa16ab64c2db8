//! OpenAI chat completions adapter.
//!
//! Also hosts the chat-completions wire format shared with the Grok adapter,
//! which speaks the same protocol against a different host.

use crate::error::{CoreError, CoreResult};
use crate::llm::capability::capabilities;
use crate::llm::client::{check_request, failed_stream, ChatRequest, FrameStream, ProviderClient};
use crate::llm::config::ProviderConfig;
use crate::llm::http;
use crate::llm::sse::{self, Delta, DeltaExtractor};
use crate::messages::ConversationMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";
const MODELS_PATH: &str = "v1/models";

/// Request body for the chat completions API.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    stream: bool,
}

impl ChatCompletionRequest {
    /// Builds the body for a request, mapping roles and settings.
    pub(crate) fn new(request: &ChatRequest, stream: bool) -> Self {
        let settings = request.settings.unwrap_or_default();
        Self {
            model: request.model.clone(),
            messages: convert_messages(&request.messages),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            top_p: settings.top_p,
            frequency_penalty: settings.frequency_penalty,
            presence_penalty: settings.presence_penalty,
            stream,
        }
    }
}

/// A message in chat completions format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct WireMessage {
    role: &'static str,
    content: String,
}

/// Non-streaming response from the chat completions API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChoice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Converts conversation messages to chat completions format, preserving order.
pub(crate) fn convert_messages(messages: &[ConversationMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|msg| WireMessage {
            role: msg.sender_role.wire_role(),
            content: msg.text.clone(),
        })
        .collect()
}

/// Extracts the reply text from a blocking response.
///
/// # Errors
///
/// Returns `ContentFiltered` when the first choice stopped on the content
/// filter and `ProviderError` when there is no text.
pub(crate) fn extract_reply(
    response: ChatCompletionResponse,
    provider: &str,
) -> CoreResult<String> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Err(CoreError::no_response(provider));
    };

    let text = choice
        .message
        .and_then(|m| m.content)
        .filter(|t| !t.is_empty());

    match (text, choice.finish_reason.as_deref()) {
        (None, Some("content_filter")) => Err(CoreError::content_filtered(format!(
            "{provider} stopped the reply on its content filter"
        ))),
        (Some(text), _) => Ok(text),
        (None, _) => Err(CoreError::no_response(provider)),
    }
}

/// Maps an in-band `error` object in a stream frame.
pub(crate) fn in_band_error(error: &Value) -> CoreError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .unwrap_or("stream reported an error")
        .to_string();

    let labels = [error.get("type"), error.get("code")];
    if labels
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .any(http::is_content_policy_label)
    {
        CoreError::content_filtered(message)
    } else {
        CoreError::provider(message)
    }
}

/// Pulls the text delta from `choices[0].delta.content`.
pub(crate) fn chat_delta(frame: &Value) -> Delta {
    if let Some(error) = frame.get("error") {
        return Delta::Failed(in_band_error(error));
    }

    frame
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map_or(Delta::Ignore, |text| Delta::Text(text.to_string()))
}

/// OpenAI variant of [`chat_delta`] that also reports content filter stops.
fn openai_delta(frame: &Value) -> Delta {
    match chat_delta(frame) {
        Delta::Ignore
            if frame.pointer("/choices/0/finish_reason").and_then(Value::as_str)
                == Some("content_filter") =>
        {
            Delta::Failed(CoreError::content_filtered(
                "OpenAI stopped the reply on its content filter",
            ))
        }
        delta => delta,
    }
}

/// Chat-completions transport shared by OpenAI and Grok.
#[derive(Clone)]
pub(crate) struct ChatCompletionsApi {
    client: Client,
    config: ProviderConfig,
    name: &'static str,
    extract: DeltaExtractor,
}

impl std::fmt::Debug for ChatCompletionsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsApi")
            .field("name", &self.name)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsApi {
    pub(crate) fn new(
        config: ProviderConfig,
        name: &'static str,
        extract: DeltaExtractor,
    ) -> CoreResult<Self> {
        Ok(Self {
            client: http::build_client(&config)?,
            config,
            name,
            extract,
        })
    }

    pub(crate) fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn post(&self, credential: &str, body: &ChatCompletionRequest) -> reqwest::RequestBuilder {
        self.client
            .post(self.config.endpoint(CHAT_COMPLETIONS_PATH))
            .bearer_auth(credential)
            .json(body)
    }

    pub(crate) async fn send(&self, request: ChatRequest) -> CoreResult<String> {
        let body = ChatCompletionRequest::new(&request, false);
        tracing::debug!(
            provider = %self.name,
            model = %request.model,
            messages = body.messages.len(),
            "Sending chat completion"
        );

        let response =
            http::send(self.post(&request.credential, &body), &request.cancellation).await?;
        if !response.status().is_success() {
            return Err(http::error_from_response(response, self.name, &request.cancellation).await);
        }

        let completion: ChatCompletionResponse =
            http::read_json(response, self.name, &request.cancellation).await?;
        let reply = extract_reply(completion, self.name)?;
        tracing::info!(
            provider = %self.name,
            model = %request.model,
            chars = reply.len(),
            "Chat completion finished"
        );
        Ok(reply)
    }

    pub(crate) fn stream(&self, request: ChatRequest) -> FrameStream {
        let body = ChatCompletionRequest::new(&request, true);
        tracing::debug!(
            provider = %self.name,
            model = %request.model,
            messages = body.messages.len(),
            "Opening chat completion stream"
        );

        let builder = self.post(&request.credential, &body);
        let name = self.name;
        let cancellation = request.cancellation.clone();
        let open = async move {
            let response = http::send(builder, &cancellation).await?;
            if !response.status().is_success() {
                return Err(http::error_from_response(response, name, &cancellation).await);
            }
            Ok::<_, CoreError>(response.bytes_stream())
        };

        sse::open_frame_stream(open, self.extract, name.to_string(), request.cancellation)
    }

    pub(crate) async fn validate(&self, credential: &str) -> CoreResult<bool> {
        let request = self
            .client
            .get(self.config.endpoint(MODELS_PATH))
            .bearer_auth(credential);
        http::check_credential(request, self.name, &CancellationToken::new()).await
    }
}

/// Adapter for the OpenAI chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    api: ChatCompletionsApi,
}

impl OpenAIClient {
    /// Human-readable provider name.
    pub const NAME: &'static str = "OpenAI";

    /// Creates a new OpenAI adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ProviderConfig) -> CoreResult<Self> {
        Ok(Self {
            api: ChatCompletionsApi::new(config, Self::NAME, openai_delta)?,
        })
    }

    /// Returns the adapter configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        self.api.config()
    }
}

#[async_trait]
impl ProviderClient for OpenAIClient {
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
