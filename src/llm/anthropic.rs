//! Anthropic messages API adapter.
//!
//! HTTP client for the Claude messages API, including streaming SSE
//! response handling.

use crate::error::{CoreError, CoreResult};
use crate::llm::capability::capabilities;
use crate::llm::client::{check_request, failed_stream, ChatRequest, FrameStream, ProviderClient};
use crate::llm::config::ProviderConfig;
use crate::llm::http;
use crate::llm::sse::{self, Delta};
use crate::messages::{ConversationMessage, SenderRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

const MESSAGES_PATH: &str = "v1/messages";
const MODELS_PATH: &str = "v1/models";

/// `max_tokens` is mandatory on this API; used when the caller sets none.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Request body for the messages API.
#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

impl MessagesRequest {
    fn new(request: &ChatRequest, stream: bool) -> Self {
        let settings = request.settings.unwrap_or_default();
        if settings.frequency_penalty.is_some() || settings.presence_penalty.is_some() {
            tracing::debug!(
                model = %request.model,
                "Dropping penalty settings unsupported by Anthropic"
            );
        }

        let (system, messages) = convert_messages(&request.messages);
        Self {
            model: request.model.clone(),
            max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            temperature: settings.temperature,
            top_p: settings.top_p,
            stream,
        }
    }
}

/// A message in the API format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

/// Response from the messages API (non-streaming).
#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// A content block in the response.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Splits system text out of the conversation.
///
/// System messages are joined into the top-level `system` field; every other
/// message keeps its position.
fn convert_messages(messages: &[ConversationMessage]) -> (Option<String>, Vec<ApiMessage>) {
    let mut system: Vec<&str> = Vec::new();
    let mut api_messages = Vec::new();

    for msg in messages {
        match msg.sender_role {
            SenderRole::System => system.push(&msg.text),
            role => api_messages.push(ApiMessage {
                role: role.wire_role(),
                content: msg.text.clone(),
            }),
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, api_messages)
}

/// Concatenates the text blocks of a response.
fn extract_text_content(response: &MessagesResponse) -> String {
    response
        .content
        .iter()
        .filter_map(|block| match block {
            ResponseContentBlock::Text { text } => Some(text.as_str()),
            ResponseContentBlock::Other => None,
        })
        .collect()
}

/// Maps an Anthropic error `type` to the taxonomy.
fn map_error_type(error_type: &str, message: String) -> CoreError {
    match error_type {
        "authentication_error" | "permission_error" => CoreError::invalid_credential(message),
        "rate_limit_error" => CoreError::rate_limited(message),
        "not_found_error" => CoreError::provider(format!("model not available: {message}")),
        "timeout_error" => CoreError::timeout(message),
        other if http::is_content_policy_label(other) => CoreError::content_filtered(message),
        _ => CoreError::provider(message),
    }
}

/// Pulls the text delta out of one stream event.
fn anthropic_delta(frame: &Value) -> Delta {
    match frame.get("type").and_then(Value::as_str) {
        Some("content_block_delta") => frame
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .map_or(Delta::Ignore, |text| Delta::Text(text.to_string())),
        Some("error") => {
            let error = frame.get("error");
            let error_type = error
                .and_then(|e| e.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("api_error");
            let message = error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("stream reported an error")
                .to_string();
            Delta::Failed(map_error_type(error_type, message))
        }
        _ => Delta::Ignore,
    }
}

/// Adapter for the Anthropic messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: ProviderConfig,
}

impl AnthropicClient {
    /// Human-readable provider name.
    pub const NAME: &'static str = "Anthropic";

    /// Creates a new Anthropic adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ProviderConfig) -> CoreResult<Self> {
        Ok(Self {
            client: http::build_client(&config)?,
            config,
        })
    }

    /// Returns the adapter configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        credential: &str,
    ) -> reqwest::RequestBuilder {
        let builder = builder.header("x-api-key", credential);
        if self.config.api_version.is_empty() {
            builder
        } else {
            builder.header("anthropic-version", &self.config.api_version)
        }
    }

    fn post(&self, credential: &str, body: &MessagesRequest) -> reqwest::RequestBuilder {
        self.authorized(self.client.post(self.config.endpoint(MESSAGES_PATH)), credential)
            .json(body)
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn provider_name(&self) -> &str {
        Self::NAME
    }

    fn available_models(&self) -> Vec<String> {
        self.config.models.clone()
    }

    fn default_model(&self) -> String {
        self.config.default_model.clone()
    }

    fn supports_streaming(&self) -> bool {
        capabilities(&self.config.provider_id).is_some_and(|c| c.supports_streaming)
    }

    async fn send_message(&self, request: ChatRequest) -> CoreResult<String> {
        check_request(self, &request)?;

        let body = MessagesRequest::new(&request, false);
        tracing::debug!(
            provider = Self::NAME,
            model = %request.model,
            messages = body.messages.len(),
            has_system = body.system.is_some(),
            "Sending messages request"
        );

        let response =
            http::send(self.post(&request.credential, &body), &request.cancellation).await?;
        if !response.status().is_success() {
            return Err(
                http::error_from_response(response, Self::NAME, &request.cancellation).await,
            );
        }

        let message: MessagesResponse =
            http::read_json(response, Self::NAME, &request.cancellation).await?;
        let text = extract_text_content(&message);
        if text.is_empty() {
            if message.stop_reason.as_deref() == Some("refusal") {
                return Err(CoreError::content_filtered("Anthropic refused to answer"));
            }
            return Err(CoreError::no_response(Self::NAME));
        }

        tracing::info!(
            provider = Self::NAME,
            model = %request.model,
            chars = text.len(),
            "Messages request finished"
        );
        Ok(text)
    }

    async fn validate_credential(&self, credential: &str) -> CoreResult<bool> {
        if credential.trim().is_empty() {
            return Err(CoreError::missing_credential(Self::NAME));
        }
        let request =
            self.authorized(self.client.get(self.config.endpoint(MODELS_PATH)), credential);
        http::check_credential(request, Self::NAME, &CancellationToken::new()).await
    }

    fn stream_message(&self, request: ChatRequest) -> FrameStream {
        if let Err(error) = check_request(self, &request) {
            return failed_stream(error);
        }

        let body = MessagesRequest::new(&request, true);
        tracing::debug!(
            provider = Self::NAME,
            model = %request.model,
            messages = body.messages.len(),
            "Opening messages stream"
        );

        let builder = self.post(&request.credential, &body);
        let cancellation = request.cancellation.clone();
        let open = async move {
            let response = http::send(builder, &cancellation).await?;
            if !response.status().is_success() {
                return Err(http::error_from_response(response, Self::NAME, &cancellation).await);
            }
            Ok::<_, CoreError>(response.bytes_stream())
        };

        sse::open_frame_stream(open, anthropic_delta, Self::NAME.to_string(), request.cancellation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::messages::GenerationSettings;
    use serde_json::json;

    #[test]
    fn convert_messages_extracts_system() {
        let messages = vec![
            ConversationMessage::system("You are terse."),
            ConversationMessage::user("Hello"),
            ConversationMessage::assistant("Hi"),
            ConversationMessage::system("Answer in English."),
            ConversationMessage::user("Again"),
        ];

        let (system, api_messages) = convert_messages(&messages);

        assert_eq!(
            system.as_deref(),
            Some("You are terse.\n\nAnswer in English.")
        );
        let roles: Vec<_> = api_messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["user", "assistant", "user"]);
        assert_eq!(api_messages[2].content, "Again");
    }

    #[test]
    fn convert_messages_without_system() {
        let (system, api_messages) = convert_messages(&[ConversationMessage::user("Hi")]);
        assert!(system.is_none());
        assert_eq!(api_messages.len(), 1);
    }

    #[test]
    fn body_defaults_max_tokens_and_drops_penalties() {
        let request = ChatRequest::new(
            vec![ConversationMessage::user("Hi")],
            "key",
            "claude-3-5-sonnet-20241022",
        )
        .with_settings(
            GenerationSettings::new()
                .with_temperature(0.3)
                .with_presence_penalty(1.0),
        );

        let value = serde_json::to_value(MessagesRequest::new(&request, false)).unwrap();
        assert_eq!(value["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!((value["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!(value.get("presence_penalty").is_none());
        assert!(value.get("frequency_penalty").is_none());
        assert!(value.get("system").is_none());
    }

    #[test]
    fn body_uses_caller_max_tokens() {
        let request = ChatRequest::new(vec![], "key", "claude-3-haiku-20240307")
            .with_settings(GenerationSettings::new().with_max_tokens(256));
        let value = serde_json::to_value(MessagesRequest::new(&request, true)).unwrap();
        assert_eq!(value["max_tokens"], 256);
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn extract_text_content_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "t", "name": "x", "input": {}},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(extract_text_content(&response), "Hello world");
    }

    #[test]
    fn delta_reads_text_delta() {
        let frame = json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": "Hel"}
        });
        assert_eq!(anthropic_delta(&frame), Delta::Text("Hel".into()));
    }

    #[test]
    fn delta_ignores_lifecycle_events() {
        let events = [
            "message_start",
            "content_block_start",
            "ping",
            "message_delta",
            "message_stop",
        ];
        for event in events {
            assert_eq!(anthropic_delta(&json!({"type": event})), Delta::Ignore);
        }
    }

    #[test]
    fn delta_maps_error_events() {
        let overloaded = json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}});
        assert_eq!(
            anthropic_delta(&overloaded),
            Delta::Failed(CoreError::provider("Overloaded"))
        );

        let limited = json!({"type": "error", "error": {"type": "rate_limit_error", "message": "slow"}});
        let Delta::Failed(error) = anthropic_delta(&limited) else {
            panic!("expected failure");
        };
        assert_eq!(error.kind, ErrorKind::RateLimit);
    }

    #[test]
    fn error_type_table() {
        assert_eq!(
            map_error_type("authentication_error", String::new()).kind,
            ErrorKind::InvalidCredential
        );
        assert_eq!(
            map_error_type("permission_error", String::new()).kind,
            ErrorKind::InvalidCredential
        );
        assert_eq!(
            map_error_type("api_error", String::new()).kind,
            ErrorKind::ProviderError
        );
    }

    #[test]
    fn client_reports_config() {
        let client = AnthropicClient::new(ProviderConfig::anthropic()).unwrap();
        assert_eq!(client.provider_name(), "Anthropic");
        assert_eq!(client.default_model(), "claude-3-5-sonnet-20241022");
        assert_eq!(client.config().api_version, "2023-06-01");
        assert!(client.supports_streaming());
    }
}
