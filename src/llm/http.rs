//! HTTP plumbing shared by the provider adapters.
//!
//! Every adapter sends through [`send`] so the cancellation token is honoured
//! uniformly, and maps non-success responses through [`error_from_response`]
//! so the status table lives in one place.

use crate::error::{CoreError, CoreResult};
use crate::llm::config::ProviderConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Builds the HTTP client an adapter shares across calls.
///
/// # Errors
///
/// Returns `Unknown` if the TLS backend cannot be initialised.
pub fn build_client(config: &ProviderConfig) -> CoreResult<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| CoreError::unknown(format!("failed to create HTTP client: {e}")))
}

/// Sends a request, racing it against the cancellation token.
///
/// # Errors
///
/// Returns `Timeout` when cancelled or when the client timeout elapses, and
/// `Unknown` for any other transport failure.
pub async fn send(
    request: RequestBuilder,
    cancellation: &CancellationToken,
) -> CoreResult<Response> {
    tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(CoreError::cancelled()),
        result = request.send() => result.map_err(map_transport_error),
    }
}

/// Reads a success body and decodes it as JSON.
///
/// # Errors
///
/// Returns `Timeout` when cancelled, `Unknown` if the body cannot be read and
/// `ProviderError` if it is not the expected JSON shape.
pub async fn read_json<T: DeserializeOwned>(
    response: Response,
    provider: &str,
    cancellation: &CancellationToken,
) -> CoreResult<T> {
    let body = tokio::select! {
        biased;
        () = cancellation.cancelled() => return Err(CoreError::cancelled()),
        body = response.bytes() => body.map_err(map_transport_error)?,
    };

    serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(provider = %provider, error = %e, "Undecodable response body");
        CoreError::provider(format!("failed to parse response from {provider}: {e}"))
    })
}

/// Maps a reqwest transport error to the taxonomy.
#[must_use]
pub fn map_transport_error(error: reqwest::Error) -> CoreError {
    if error.is_timeout() {
        CoreError::timeout(format!("request timed out: {error}"))
    } else if error.is_connect() {
        CoreError::unknown(format!("connection failed: {error}"))
    } else {
        CoreError::unknown(error.to_string())
    }
}

/// Consumes a non-success response and maps it to the taxonomy.
///
/// The body read is raced against `cancellation`; a cancelled read yields
/// `Timeout` instead of the status mapping.
pub async fn error_from_response(
    response: Response,
    provider: &str,
    cancellation: &CancellationToken,
) -> CoreError {
    let status = response.status();
    let body = tokio::select! {
        biased;
        () = cancellation.cancelled() => return CoreError::cancelled(),
        body = response.text() => body.unwrap_or_default(),
    };
    let error = classify_status(status, &body);
    tracing::warn!(
        provider = %provider,
        status = status.as_u16(),
        kind = %error.kind,
        "Provider request failed"
    );
    error
}

/// Issues a credential check request and interprets its status.
///
/// # Errors
///
/// Returns the mapped error for any status other than success, 401 or 403.
pub async fn check_credential(
    request: RequestBuilder,
    provider: &str,
    cancellation: &CancellationToken,
) -> CoreResult<bool> {
    let response = send(request, cancellation).await?;
    let status = response.status();
    if status.is_success() {
        return Ok(true);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::debug!(provider = %provider, status = status.as_u16(), "Credential rejected");
        return Ok(false);
    }
    Err(error_from_response(response, provider, cancellation).await)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        #[serde(default)]
        message: Option<String>,
        #[serde(default, rename = "type")]
        error_type: Option<String>,
        #[serde(default)]
        code: Option<serde_json::Value>,
        #[serde(default)]
        status: Option<String>,
    },
    Plain(String),
}

impl ErrorBody {
    fn message(&self) -> Option<&str> {
        match self {
            Self::Detailed { message, .. } => message.as_deref(),
            Self::Plain(message) => Some(message.as_str()),
        }
    }

    fn names_content_policy(&self) -> bool {
        let Self::Detailed {
            error_type,
            code,
            status,
            ..
        } = self
        else {
            return false;
        };

        let code = code.as_ref().and_then(serde_json::Value::as_str);
        [error_type.as_deref(), code, status.as_deref()]
            .into_iter()
            .flatten()
            .any(is_content_policy_label)
    }
}

/// Returns true if an error type or code names a content policy.
#[must_use]
pub fn is_content_policy_label(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    label.contains("content_filter")
        || label.contains("content_policy")
        || label.contains("safety")
}

/// Maps a status code and error body to the taxonomy.
///
/// The provider's `error.message` (or a plain string `error`) is surfaced as
/// the diagnostic; otherwise the canonical status reason is used.
#[must_use]
pub fn classify_status(status: StatusCode, body: &str) -> CoreError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let detail = parsed
        .as_ref()
        .and_then(|envelope| envelope.error.message())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let reason = status.canonical_reason().unwrap_or("unknown status");
            format!("HTTP {}: {reason}", status.as_u16())
        });

    if parsed
        .as_ref()
        .is_some_and(|envelope| envelope.error.names_content_policy())
    {
        return CoreError::content_filtered(detail);
    }

    match status.as_u16() {
        401 | 403 => CoreError::invalid_credential(detail),
        429 => CoreError::rate_limited(detail),
        404 => CoreError::provider(format!("model not available: {detail}")),
        408 | 504 => CoreError::timeout(detail),
        _ => CoreError::provider(detail),
    }
}
