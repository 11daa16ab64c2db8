//! Conversation message and generation settings types.

use crate::types::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    /// The human participant
    User,
    /// System instructions
    System,
    /// A model participant
    Assistant,
}

impl SenderRole {
    /// Returns the role name used on the OpenAI-style wire.
    ///
    /// Only `user` and `system` keep their names; every other sender is
    /// reported to providers as `assistant`.
    #[must_use]
    pub fn wire_role(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
            Self::Assistant => "assistant",
        }
    }
}

impl From<&str> for SenderRole {
    fn from(value: &str) -> Self {
        match value {
            "user" => Self::User,
            "system" => Self::System,
            _ => Self::Assistant,
        }
    }
}

impl<'de> Deserialize<'de> for SenderRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// Delivery state of a message produced by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Request is in flight
    Sending,
    /// Reply completed
    Sent,
    /// Request failed
    Error,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Identifier, unique within the conversation
    pub id: MessageId,
    /// The author of the message
    pub sender_role: SenderRole,
    /// The message text
    pub text: String,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// Provider that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Model that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Delivery state for provider replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    /// User-facing error sentence when delivery failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversationMessage {
    /// Creates a message from the given sender with a fresh id and timestamp.
    #[must_use]
    pub fn new(sender_role: SenderRole, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sender_role,
            text: text.into(),
            timestamp: Utc::now(),
            provider_id: None,
            model_id: None,
            delivery_status: None,
            error: None,
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(SenderRole::User, text)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SenderRole::System, text)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(SenderRole::Assistant, text)
    }

    /// Creates an empty in-flight assistant placeholder for a provider reply.
    #[must_use]
    pub fn placeholder(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::assistant("")
            .with_provider(provider_id)
            .with_model(model_id)
            .with_status(DeliveryStatus::Sending)
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Sets the provider that produced this message.
    #[must_use]
    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    /// Sets the model that produced this message.
    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Sets the delivery status.
    #[must_use]
    pub fn with_status(mut self, status: DeliveryStatus) -> Self {
        self.delivery_status = Some(status);
        self
    }

    /// Fills a placeholder with the completed reply text.
    #[must_use]
    pub fn completed(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self.delivery_status = Some(DeliveryStatus::Sent);
        self.error = None;
        self
    }

    /// Marks a placeholder as failed with the given user-facing sentence.
    ///
    /// Any partial text received before the failure is kept.
    #[must_use]
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.delivery_status = Some(DeliveryStatus::Error);
        self.error = Some(error.into());
        self
    }

    /// Returns true if delivery of this message failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.delivery_status == Some(DeliveryStatus::Error)
    }
}

/// Optional sampling parameters; a missing field means "provider default".
///
/// Ranges are not validated here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Frequency penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

impl GenerationSettings {
    /// Creates settings that defer everything to the provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the maximum tokens to generate.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets top-p.
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets the frequency penalty.
    #[must_use]
    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    /// Sets the presence penalty.
    #[must_use]
    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roles() {
        assert_eq!(SenderRole::User.wire_role(), "user");
        assert_eq!(SenderRole::System.wire_role(), "system");
        assert_eq!(SenderRole::Assistant.wire_role(), "assistant");
    }

    #[test]
    fn unknown_sender_deserializes_as_assistant() {
        let role: SenderRole = serde_json::from_str("\"participant\"").unwrap();
        assert_eq!(role, SenderRole::Assistant);

        let role: SenderRole = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, SenderRole::System);
    }

    #[test]
    fn placeholder_is_sending() {
        let message = ConversationMessage::placeholder("openai", "gpt-4o");
        assert_eq!(message.sender_role, SenderRole::Assistant);
        assert_eq!(message.delivery_status, Some(DeliveryStatus::Sending));
        assert_eq!(message.provider_id.as_deref(), Some("openai"));
        assert_eq!(message.model_id.as_deref(), Some("gpt-4o"));
        assert!(message.text.is_empty());
    }

    #[test]
    fn completed_sets_text_and_status() {
        let message = ConversationMessage::placeholder("openai", "gpt-4o").completed("Hi");
        assert_eq!(message.text, "Hi");
        assert_eq!(message.delivery_status, Some(DeliveryStatus::Sent));
        assert!(!message.is_failed());
    }

    #[test]
    fn failed_keeps_partial_text() {
        let message = ConversationMessage::placeholder("grok", "grok-beta")
            .completed("partial")
            .failed("Rate limit exceeded. Please try again later.");
        assert!(message.is_failed());
        assert_eq!(message.text, "partial");
        assert!(message.error.as_deref().unwrap().contains("Rate limit"));
    }

    #[test]
    fn caller_message_deserializes_without_optional_fields() {
        let json = r#"{
            "id": "m-1",
            "sender_role": "user",
            "text": "Hello",
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;
        let message: ConversationMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.id.as_str(), "m-1");
        assert_eq!(message.sender_role, SenderRole::User);
        assert!(message.delivery_status.is_none());
    }

    #[test]
    fn settings_skip_missing_fields() {
        let settings = GenerationSettings::new().with_max_tokens(256);
        let json = serde_json::to_value(settings).unwrap();
        assert_eq!(json, serde_json::json!({"max_tokens": 256}));
    }
}
