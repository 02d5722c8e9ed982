//! API key provider.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AuthProvider, UserDirectory};
use crate::config::{ApiKeyConfig, CredentialKind};
use crate::credential::Credential;
use crate::crypto;
use crate::error::{Error, Result};
use crate::principal::Principal;

/// Verifies API keys (header, query, or custom-header delivered) against a
/// [`UserDirectory`].
pub struct ApiKeyProvider {
    directory: Arc<dyn UserDirectory>,
    config: ApiKeyConfig,
}

impl ApiKeyProvider {
    /// Build a provider backed by `directory`.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>, config: ApiKeyConfig) -> Self {
        Self { directory, config }
    }
}

#[async_trait]
impl AuthProvider for ApiKeyProvider {
    fn kind(&self) -> CredentialKind {
        CredentialKind::ApiKey
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Principal> {
        let Credential::ApiKey { value, .. } = credential else {
            return Err(Error::Internal(
                "ApiKeyProvider received a non-ApiKey credential".to_string(),
            ));
        };

        let lookup_value = if self.config.hashing {
            crypto::digest_hex(value.as_bytes())
        } else {
            value.clone()
        };

        self.directory
            .verify_api_key(&lookup_value)
            .ok_or_else(|| Error::Unauthorized("invalid API key".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryUserDirectory;

    #[tokio::test]
    async fn authenticates_known_key() {
        let digest = crypto::digest_hex(b"sk_live_abc123");
        let directory = Arc::new(
            InMemoryUserDirectory::new().with_api_key(digest, Principal::new("service-x")),
        );
        let provider = ApiKeyProvider::new(directory, ApiKeyConfig::default());
        let credential = Credential::ApiKey {
            value: "sk_live_abc123".to_string(),
            location_hint: crate::config::CredentialSource::CustomHeader,
        };
        let principal = provider.authenticate(&credential).await.unwrap();
        assert_eq!(principal.subject_id, "service-x");
    }

    #[tokio::test]
    async fn rejects_unknown_key() {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let provider = ApiKeyProvider::new(directory, ApiKeyConfig::default());
        let credential = Credential::ApiKey {
            value: "unknown".to_string(),
            location_hint: crate::config::CredentialSource::CustomHeader,
        };
        assert!(provider.authenticate(&credential).await.is_err());
    }
}
