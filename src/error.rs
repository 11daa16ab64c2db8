//! Error taxonomy for the chorus client layer.
//!
//! Every failure that crosses an adapter boundary is expressed as a
//! [`CoreError`] carrying one of the closed set of [`ErrorKind`] values.
//! Provider-specific payloads never travel past this type; only a short
//! diagnostic message and the kind the UI uses to pick what to show.
//!
//! Credential storage and configuration loading have their own error types
//! below; they never reach the UI as taxonomy kinds.
//!
//! No external error crates (anyhow, thiserror, eyre) are used in the library.

use crate::messages::ConversationMessage;
use std::fmt;

/// Result alias used by every operation that can fail with a taxonomy error.
pub type CoreResult<T> = Result<T, CoreError>;

/// The closed set of error categories used for all cross-boundary reporting.
///
/// New kinds are added here first; producers must pick an existing kind
/// rather than inventing ad hoc strings for control decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The provider identifier is empty or not registered
    InvalidProvider,
    /// No credential is available for the provider
    MissingCredential,
    /// The provider rejected the credential
    InvalidCredential,
    /// The provider failed, refused the request, or returned nothing usable
    ProviderError,
    /// The provider throttled the request
    RateLimit,
    /// The request timed out or was cancelled
    Timeout,
    /// The provider's content filter blocked the request or reply
    ContentFiltered,
    /// Anything that could not be classified
    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::InvalidProvider,
        ErrorKind::MissingCredential,
        ErrorKind::InvalidCredential,
        ErrorKind::ProviderError,
        ErrorKind::RateLimit,
        ErrorKind::Timeout,
        ErrorKind::ContentFiltered,
        ErrorKind::Unknown,
    ];

    /// Returns the user-facing sentence for this kind.
    #[must_use]
    pub fn explanation(self) -> &'static str {
        match self {
            Self::InvalidProvider => "The selected provider is not supported.",
            Self::MissingCredential => {
                "No API key is configured for this provider. Please add one in settings."
            }
            Self::InvalidCredential => {
                "The API key was rejected by the provider. Please check that it is correct."
            }
            Self::ProviderError => "The provider returned an error. Please try again.",
            Self::RateLimit => "Rate limit exceeded. Please try again later.",
            Self::Timeout => "The request timed out or was cancelled.",
            Self::ContentFiltered => "The response was blocked by the provider's content filter.",
            Self::Unknown => "An unexpected error occurred.",
        }
    }

    /// Returns the stable machine-readable code for this kind.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidProvider => "INVALID_PROVIDER",
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::ProviderError => "PROVIDER_ERROR",
            Self::RateLimit => "RATE_LIMIT",
            Self::Timeout => "TIMEOUT",
            Self::ContentFiltered => "CONTENT_FILTERED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An error reported by the client layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    /// The taxonomy kind
    pub kind: ErrorKind,
    /// Diagnostic message (may quote the provider's `error.message`)
    pub message: String,
    /// The failed placeholder message handed back by the facade, if any
    pub offending_message: Option<Box<ConversationMessage>>,
}

impl CoreError {
    /// Creates a new error with the given kind and message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offending_message: None,
        }
    }

    /// Creates an invalid provider error.
    #[must_use]
    pub fn invalid_provider(provider_id: &str) -> Self {
        if provider_id.is_empty() {
            Self::new(ErrorKind::InvalidProvider, "no provider was selected")
        } else {
            Self::new(
                ErrorKind::InvalidProvider,
                format!("unknown provider '{provider_id}'"),
            )
        }
    }

    /// Creates a missing credential error.
    #[must_use]
    pub fn missing_credential(provider: &str) -> Self {
        Self::new(
            ErrorKind::MissingCredential,
            format!("no API key configured for {provider}"),
        )
    }

    /// Creates an invalid credential error.
    #[must_use]
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCredential, message)
    }

    /// Creates a provider error.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderError, message)
    }

    /// Creates the error for a provider that answered with nothing.
    #[must_use]
    pub fn no_response(provider: &str) -> Self {
        Self::provider(format!("no response from provider {provider}"))
    }

    /// Creates the error for a model the adapter does not know.
    #[must_use]
    pub fn unsupported_model(provider: &str, model: &str) -> Self {
        Self::provider(format!("model '{model}' is not supported by {provider}"))
    }

    /// Creates a rate limit error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Creates the error reported when a cancellation token fires.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::timeout("the operation was cancelled")
    }

    /// Creates a content filtered error.
    #[must_use]
    pub fn content_filtered(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContentFiltered, message)
    }

    /// Creates an unknown error.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Attaches the failed placeholder message.
    #[must_use]
    pub fn with_offending_message(mut self, message: ConversationMessage) -> Self {
        self.offending_message = Some(Box::new(message));
        self
    }

    /// Returns the user-facing sentence for this error's kind.
    #[must_use]
    pub fn explanation(&self) -> &'static str {
        self.kind.explanation()
    }

    /// Returns true if this error came from a cancellation or timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CoreError {}

/// Errors that can occur while persisting credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    /// The specific error that occurred
    pub kind: StorageErrorKind,
}

/// Specific storage error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// The credential file could not be read or written
    Io {
        /// Path of the file
        path: String,
        /// Underlying reason
        reason: String,
    },
    /// The credential file exists but is not valid TOML
    Corrupt {
        /// Path of the file
        path: String,
        /// Parser message
        reason: String,
    },
    /// No location is available for persistent storage
    NoConfigDir,
}

impl StorageError {
    /// Creates a new StorageError with the given kind.
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an I/O error for a path.
    #[must_use]
    pub fn io(path: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::new(StorageErrorKind::Io {
            path: path.display().to_string(),
            reason: reason.to_string(),
        })
    }

    /// Creates a corrupt file error for a path.
    #[must_use]
    pub fn corrupt(path: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::new(StorageErrorKind::Corrupt {
            path: path.display().to_string(),
            reason: reason.to_string(),
        })
    }

    /// Creates the error for a platform without a config directory.
    #[must_use]
    pub fn no_config_dir() -> Self {
        Self::new(StorageErrorKind::NoConfigDir)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StorageErrorKind::Io { path, reason } => {
                write!(f, "failed to access credential file '{path}': {reason}")
            }
            StorageErrorKind::Corrupt { path, reason } => write!(
                f,
                "credential file '{path}' is corrupt: {reason}; fix or delete it"
            ),
            StorageErrorKind::NoConfigDir => write!(
                f,
                "no user configuration directory is available; use session storage instead"
            ),
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// The specific error that occurred
    pub kind: ConfigErrorKind,
}

/// Specific configuration error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// The configuration file could not be read
    Read {
        /// Path of the file
        path: String,
        /// Underlying reason
        reason: String,
    },
    /// The configuration is not valid TOML or does not match the schema
    Parse {
        /// Parser message
        reason: String,
    },
    /// A field holds an unusable value
    InvalidValue {
        /// Dotted path of the field
        field: String,
        /// Why it was invalid
        reason: String,
    },
}

impl ConfigError {
    /// Creates a new ConfigError with the given kind.
    #[must_use]
    pub fn new(kind: ConfigErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a read error.
    #[must_use]
    pub fn read(path: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::new(ConfigErrorKind::Read {
            path: path.display().to_string(),
            reason: reason.to_string(),
        })
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(reason: impl fmt::Display) -> Self {
        Self::new(ConfigErrorKind::Parse {
            reason: reason.to_string(),
        })
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConfigErrorKind::Read { path, reason } => {
                write!(f, "failed to read config file '{path}': {reason}")
            }
            ConfigErrorKind::Parse { reason } => write!(f, "invalid configuration: {reason}"),
            ConfigErrorKind::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_kind_has_a_distinct_sentence() {
        let sentences: HashSet<_> = ErrorKind::ALL.iter().map(|k| k.explanation()).collect();
        assert_eq!(sentences.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn every_kind_has_a_distinct_code() {
        let codes: HashSet<_> = ErrorKind::ALL.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn rate_limit_sentence() {
        assert_eq!(
            ErrorKind::RateLimit.explanation(),
            "Rate limit exceeded. Please try again later."
        );
    }

    #[test]
    fn display_includes_code_and_message() {
        let error = CoreError::rate_limited("slow down");
        assert_eq!(error.to_string(), "RATE_LIMIT: slow down");
    }

    #[test]
    fn no_response_mentions_provider() {
        let error = CoreError::no_response("OpenAI");
        assert_eq!(error.kind, ErrorKind::ProviderError);
        assert!(error.message.contains("no response"));
        assert!(error.message.contains("OpenAI"));
    }

    #[test]
    fn cancelled_is_timeout() {
        let error = CoreError::cancelled();
        assert!(error.is_timeout());
        assert_eq!(error.message, "the operation was cancelled");
    }

    #[test]
    fn invalid_provider_distinguishes_empty_id() {
        assert!(CoreError::invalid_provider("")
            .message
            .contains("no provider"));
        assert!(CoreError::invalid_provider("mistral")
            .message
            .contains("mistral"));
    }

    #[test]
    fn offending_message_is_attached() {
        let placeholder = ConversationMessage::assistant("");
        let error = CoreError::unknown("boom").with_offending_message(placeholder.clone());
        assert_eq!(error.offending_message.as_deref(), Some(&placeholder));
    }

    #[test]
    fn errors_are_clone_and_eq() {
        let error1 = CoreError::missing_credential("Grok");
        let error2 = error1.clone();
        assert_eq!(error1, error2);
        assert_ne!(error1, CoreError::missing_credential("Gemini"));
    }

    #[test]
    fn storage_error_display_names_path() {
        let error = StorageError::io(std::path::Path::new("/tmp/creds.toml"), "denied");
        assert_eq!(
            error.to_string(),
            "failed to access credential file '/tmp/creds.toml': denied"
        );
    }

    #[test]
    fn config_error_display_names_field() {
        let error = ConfigError::invalid_value("providers.openai.base_url", "relative URL");
        assert_eq!(
            error.to_string(),
            "invalid value for 'providers.openai.base_url': relative URL"
        );
    }
}
