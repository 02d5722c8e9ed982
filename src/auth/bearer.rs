//! Opaque bearer-token provider: looks up a token in the configured
//! [`TokenStore`] and validates its expiry.

use std::sync::Arc;

use async_trait::async_trait;

use super::AuthProvider;
use crate::config::CredentialKind;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::principal::Principal;
use crate::token::TokenStore;

/// Verifies opaque bearer tokens against a [`TokenStore`].
///
/// JWT-formatted bearer tokens (three dot-separated segments) are left to
/// [`super::jwt::JwtProvider`] — the extractor attaches the same
/// [`Credential::Bearer`] variant for both, and the pipeline decides which
/// provider to register for [`CredentialKind::Bearer`] based on
/// `auth.jwt` being configured.
pub struct BearerProvider {
    store: Arc<dyn TokenStore>,
}

impl BearerProvider {
    /// Build a provider backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthProvider for BearerProvider {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Bearer
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Principal> {
        let Credential::Bearer { token, .. } = credential else {
            return Err(Error::Internal(
                "BearerProvider received a non-Bearer credential".to_string(),
            ));
        };

        let stored = self
            .store
            .get(token)
            .await
            .ok_or_else(|| Error::Unauthorized("bearer token not found or expired".to_string()))?;

        let roles = stored
            .metadata
            .get("roles")
            .map(|r| r.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        let mut principal = Principal::new(stored.subject_id.clone()).with_roles(roles);
        if let Some(email) = stored.metadata.get("email") {
            principal.email = Some(email.clone());
        }
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{mint_token, InMemoryTokenStore, TokenType};
    use std::time::Duration;

    #[tokio::test]
    async fn authenticates_valid_bearer_token() {
        let store = Arc::new(InMemoryTokenStore::new());
        let mut token = mint_token(TokenType::Access, "alice", Duration::from_secs(60), vec![], None);
        token.metadata.insert("roles".to_string(), "viewer,editor".to_string());
        let value = token.value.clone();
        store.put(token).await;

        let provider = BearerProvider::new(store);
        let credential = Credential::Bearer {
            token: value,
            scheme_hint: "Bearer".to_string(),
        };
        let principal = provider.authenticate(&credential).await.unwrap();
        assert_eq!(principal.subject_id, "alice");
        assert!(principal.has_any_role(&["editor"]));
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let store = Arc::new(InMemoryTokenStore::new());
        let provider = BearerProvider::new(store);
        let credential = Credential::Bearer {
            token: "nonexistent".to_string(),
            scheme_hint: "Bearer".to_string(),
        };
        assert!(provider.authenticate(&credential).await.is_err());
    }

    #[tokio::test]
    async fn rejects_revoked_token() {
        let store = Arc::new(InMemoryTokenStore::new());
        let token = mint_token(TokenType::Access, "alice", Duration::from_secs(60), vec![], None);
        let value = token.value.clone();
        store.put(token).await;
        store.revoke(&value).await;

        let provider = BearerProvider::new(store);
        let credential = Credential::Bearer {
            token: value,
            scheme_hint: "Bearer".to_string(),
        };
        assert!(provider.authenticate(&credential).await.is_err());
    }
}
