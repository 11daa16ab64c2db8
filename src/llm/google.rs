//! Google Gemini adapter.
//!
//! Speaks the `generateContent` REST API. The reply shape is shared by the
//! blocking and streaming endpoints, so both paths interpret responses
//! through [`interpret`].

use crate::error::{CoreError, CoreResult};
use crate::llm::capability::capabilities;
use crate::llm::client::{check_request, failed_stream, ChatRequest, FrameStream, ProviderClient};
use crate::llm::config::ProviderConfig;
use crate::llm::http;
use crate::llm::openai::in_band_error;
use crate::llm::sse::{self, Delta};
use crate::messages::{ConversationMessage, SenderRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

const MODELS_PATH: &str = "v1beta/models";

/// Finish reasons that mean the reply was withheld by a safety system.
const BLOCKING_FINISH_REASONS: [&str; 4] = ["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn new(request: &ChatRequest) -> Self {
        let (system_instruction, contents) = convert_messages(&request.messages);
        let generation_config = request.settings.map(|s| GenerationConfig {
            temperature: s.temperature,
            max_output_tokens: s.max_tokens,
            top_p: s.top_p,
            frequency_penalty: s.frequency_penalty,
            presence_penalty: s.presence_penalty,
        });
        Self {
            contents,
            system_instruction,
            generation_config: generation_config.filter(|c| !c.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.max_output_tokens.is_none()
            && self.top_p.is_none()
            && self.frequency_penalty.is_none()
            && self.presence_penalty.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Maps the conversation to Gemini contents.
///
/// System text moves to `systemInstruction`; the assistant role is called
/// "model" on this API.
fn convert_messages(messages: &[ConversationMessage]) -> (Option<Content>, Vec<Content>) {
    let mut system: Vec<&str> = Vec::new();
    let mut contents = Vec::new();

    for msg in messages {
        match msg.sender_role {
            SenderRole::System => system.push(&msg.text),
            SenderRole::User => contents.push(Content::text(Some("user"), msg.text.clone())),
            SenderRole::Assistant => contents.push(Content::text(Some("model"), msg.text.clone())),
        }
    }

    let system = (!system.is_empty()).then(|| Content::text(None, system.join("\n\n")));
    (system, contents)
}

/// Interprets one response (or stream chunk).
fn interpret(response: &GenerateContentResponse) -> Delta {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Delta::Failed(CoreError::content_filtered(format!(
            "Google blocked the prompt ({reason})"
        )));
    }

    let Some(candidate) = response.candidates.first() else {
        return Delta::Ignore;
    };

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if !text.is_empty() {
        return Delta::Text(text);
    }

    match candidate.finish_reason.as_deref() {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason) => Delta::Failed(
            CoreError::content_filtered(format!("Google withheld the reply ({reason})")),
        ),
        _ => Delta::Ignore,
    }
}

/// Pulls the text delta out of one stream chunk.
fn google_delta(frame: &Value) -> Delta {
    if let Some(error) = frame.get("error") {
        return Delta::Failed(in_band_error(error));
    }
    match GenerateContentResponse::deserialize(frame) {
        Ok(response) => interpret(&response),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unrecognised Gemini chunk");
            Delta::Ignore
        }
    }
}

/// Adapter for the Google Gemini API.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    client: Client,
    config: ProviderConfig,
}

impl GoogleClient {
    /// Human-readable provider name.
    pub const NAME: &'static str = "Google";

    /// Creates a new Gemini adapter.
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

    fn model_endpoint(&self, model: &str, method: &str) -> String {
        self.config
            .endpoint(&format!("{MODELS_PATH}/{model}:{method}"))
    }

    fn post(
        &self,
        url: String,
        credential: &str,
        body: &GenerateContentRequest,
    ) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-goog-api-key", credential)
            .json(body)
    }
}

#[async_trait]
impl ProviderClient for GoogleClient {
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

        let body = GenerateContentRequest::new(&request);
        tracing::debug!(
            provider = Self::NAME,
            model = %request.model,
            contents = body.contents.len(),
            "Sending generateContent request"
        );

        let url = self.model_endpoint(&request.model, "generateContent");
        let response =
            http::send(self.post(url, &request.credential, &body), &request.cancellation).await?;
        if !response.status().is_success() {
            return Err(
                http::error_from_response(response, Self::NAME, &request.cancellation).await,
            );
        }

        let reply: GenerateContentResponse =
            http::read_json(response, Self::NAME, &request.cancellation).await?;
        match interpret(&reply) {
            Delta::Text(text) => {
                tracing::info!(
                    provider = Self::NAME,
                    model = %request.model,
                    chars = text.len(),
                    "generateContent finished"
                );
                Ok(text)
            }
            Delta::Failed(error) => Err(error),
            Delta::Ignore => Err(CoreError::no_response(Self::NAME)),
        }
    }

    async fn validate_credential(&self, credential: &str) -> CoreResult<bool> {
        if credential.trim().is_empty() {
            return Err(CoreError::missing_credential(Self::NAME));
        }
        let request = self
            .client
            .get(self.config.endpoint(MODELS_PATH))
            .header("x-goog-api-key", credential);
        http::check_credential(request, Self::NAME, &CancellationToken::new()).await
    }

    fn stream_message(&self, request: ChatRequest) -> FrameStream {
        if let Err(error) = check_request(self, &request) {
            return failed_stream(error);
        }

        let body = GenerateContentRequest::new(&request);
        tracing::debug!(
            provider = Self::NAME,
            model = %request.model,
            contents = body.contents.len(),
            "Opening streamGenerateContent stream"
        );

        let url = self.model_endpoint(&request.model, "streamGenerateContent");
        let builder = self
            .post(url, &request.credential, &body)
            .query(&[("alt", "sse")]);
        let cancellation = request.cancellation.clone();
        let open = async move {
            let response = http::send(builder, &cancellation).await?;
            if !response.status().is_success() {
                return Err(http::error_from_response(response, Self::NAME, &cancellation).await);
            }
            Ok::<_, CoreError>(response.bytes_stream())
        };

        sse::open_frame_stream(open, google_delta, Self::NAME.to_string(), request.cancellation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::messages::GenerationSettings;
    use serde_json::json;

    #[test]
    fn convert_messages_moves_system_and_renames_assistant() {
        let messages = vec![
            ConversationMessage::system("Be brief."),
            ConversationMessage::user("Hi"),
            ConversationMessage::assistant("Hello"),
            ConversationMessage::user("Bye"),
        ];

        let (system, contents) = convert_messages(&messages);

        assert_eq!(system, Some(Content::text(None, "Be brief.")));
        let roles: Vec<_> = contents.iter().filter_map(|c| c.role.as_deref()).collect();
        assert_eq!(roles, ["user", "model", "user"]);
    }

    #[test]
    fn body_uses_camel_case_generation_config() {
        let request = ChatRequest::new(
            vec![ConversationMessage::system("sys"), ConversationMessage::user("Hi")],
            "key",
            "gemini-1.5-pro",
        )
        .with_settings(GenerationSettings::new().with_max_tokens(100).with_top_p(0.9));

        let value = serde_json::to_value(GenerateContentRequest::new(&request)).unwrap();

        assert_eq!(value["generationConfig"]["maxOutputTokens"], 100);
        assert!(value["generationConfig"].get("topP").is_some());
        assert!(value["generationConfig"].get("temperature").is_none());
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
    }

    #[test]
    fn body_omits_empty_generation_config() {
        let request = ChatRequest::new(vec![ConversationMessage::user("Hi")], "key", "gemini-1.5-pro")
            .with_settings(GenerationSettings::new());
        let value = serde_json::to_value(GenerateContentRequest::new(&request)).unwrap();
        assert!(value.get("generationConfig").is_none());
        assert!(value.get("systemInstruction").is_none());
    }

    #[test]
    fn delta_joins_candidate_parts() {
        let frame = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo"}]},
                "index": 0
            }]
        });
        assert_eq!(google_delta(&frame), Delta::Text("Hello".into()));
    }

    #[test]
    fn delta_ignores_usage_only_chunks() {
        let frame = json!({"usageMetadata": {"totalTokenCount": 12}});
        assert_eq!(google_delta(&frame), Delta::Ignore);

        let stop = json!({"candidates": [{"content": {"parts": []}, "finishReason": "STOP"}]});
        assert_eq!(google_delta(&stop), Delta::Ignore);
    }

    #[test]
    fn safety_stop_is_content_filtered() {
        let frame = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let Delta::Failed(error) = google_delta(&frame) else {
            panic!("expected failure");
        };
        assert_eq!(error.kind, ErrorKind::ContentFiltered);
    }

    #[test]
    fn blocked_prompt_is_content_filtered() {
        let frame = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let Delta::Failed(error) = google_delta(&frame) else {
            panic!("expected failure");
        };
        assert_eq!(error.kind, ErrorKind::ContentFiltered);
        assert!(error.message.contains("SAFETY"));
    }

    #[test]
    fn in_band_error_fails_stream() {
        let frame = json!({"error": {"code": 500, "message": "internal", "status": "INTERNAL"}});
        assert_eq!(
            google_delta(&frame),
            Delta::Failed(CoreError::provider("internal"))
        );
    }

    #[test]
    fn endpoints_include_model_and_method() {
        let client = GoogleClient::new(ProviderConfig::google()).unwrap();
        assert_eq!(
            client.model_endpoint("gemini-1.5-flash", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(client.provider_name(), "Google");
        assert!(client.supports_streaming());
    }
}
