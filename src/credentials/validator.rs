//! Advisory credential checks.

use crate::llm::ClientFactory;
use std::sync::Arc;

/// Checks credentials against their provider.
///
/// Validation never fails: every error, including an unknown provider id,
/// is logged and reported as `false`.
#[derive(Debug, Clone)]
pub struct CredentialValidator {
    factory: Arc<ClientFactory>,
}

impl CredentialValidator {
    /// Creates a validator that resolves adapters through `factory`.
    #[must_use]
    pub fn new(factory: Arc<ClientFactory>) -> Self {
        Self { factory }
    }

    /// Returns true if the provider accepts the credential.
    pub async fn validate(&self, provider_id: &str, credential: &str) -> bool {
        let client = match self.factory.get_client(provider_id) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(
                    provider = %provider_id,
                    error = %e,
                    "Credential validation skipped"
                );
                return false;
            }
        };

        match client.validate_credential(credential).await {
            Ok(valid) => {
                tracing::info!(provider = %provider_id, valid, "Credential validated");
                valid
            }
            Err(e) => {
                tracing::warn!(provider = %provider_id, error = %e, "Credential validation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, CoreResult};
    use crate::llm::{ChatRequest, ProviderClient};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Scripted {
        outcome: CoreResult<bool>,
    }

    #[async_trait]
    impl ProviderClient for Scripted {
        fn provider_name(&self) -> &str {
            "Scripted"
        }

        fn available_models(&self) -> Vec<String> {
            vec!["scripted-1".to_string()]
        }

        fn default_model(&self) -> String {
            "scripted-1".to_string()
        }

        fn supports_streaming(&self) -> bool {
            false
        }

        async fn send_message(&self, _request: ChatRequest) -> CoreResult<String> {
            Err(CoreError::unknown("not used"))
        }

        async fn validate_credential(&self, _credential: &str) -> CoreResult<bool> {
            self.outcome.clone()
        }
    }

    fn validator_with(outcome: CoreResult<bool>) -> CredentialValidator {
        let factory = ClientFactory::new();
        factory.register_client("scripted", Arc::new(Scripted { outcome }));
        CredentialValidator::new(Arc::new(factory))
    }

    #[tokio::test]
    async fn accepted_credential_is_valid() {
        assert!(validator_with(Ok(true)).validate("scripted", "k").await);
    }

    #[tokio::test]
    async fn rejected_credential_is_invalid() {
        assert!(!validator_with(Ok(false)).validate("scripted", "k").await);
    }

    #[tokio::test]
    async fn adapter_error_becomes_false() {
        let validator = validator_with(Err(CoreError::unknown("connection refused")));
        assert!(!validator.validate("scripted", "k").await);
    }

    #[tokio::test]
    async fn unknown_provider_becomes_false() {
        let validator = validator_with(Ok(true));
        assert!(!validator.validate("mistral", "k").await);
        assert!(!validator.validate("", "k").await);
    }
}
