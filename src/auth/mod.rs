//! Authentication providers and the dispatcher that routes an extracted
//! [`crate::credential::Credential`] to the right one.

pub mod api_key;
pub mod basic;
pub mod bearer;
pub mod hmac;
pub mod jwt;
pub mod mtls;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::{AuthConfig, CredentialKind};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::principal::Principal;

/// Verifies one credential scheme and produces a [`Principal`] on success.
///
/// Implementations never consult roles/permissions beyond what the
/// credential itself or its backing store carries — RBAC permission
/// resolution happens once, centrally, after dispatch
///.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The credential scheme this provider verifies.
    fn kind(&self) -> CredentialKind;

    /// Verify `credential` and build the authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`], [`Error::Expired`], [`Error::Revoked`],
    /// or [`Error::Inactive`] depending on why verification failed.
    async fn authenticate(&self, credential: &Credential) -> Result<Principal>;
}

/// Routes a credential to its provider according to `primary_method` /
/// `multi_auth` / `supported_methods`.
pub struct AuthProviderSet {
    providers: HashMap<CredentialKind, Box<dyn AuthProvider>>,
    config: AuthConfig,
}

impl AuthProviderSet {
    /// Build a dispatcher from a fully configured provider list.
    #[must_use]
    pub fn new(config: AuthConfig, providers: Vec<Box<dyn AuthProvider>>) -> Self {
        let providers = providers.into_iter().map(|p| (p.kind(), p)).collect();
        Self { providers, config }
    }

    /// Authenticate `credential`, enforcing which schemes are currently
    /// accepted before dispatching to the matching provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the credential's scheme is not
    /// currently accepted, or if no provider is registered for it.
    /// Otherwise propagates the provider's own error.
    pub async fn authenticate(&self, credential: &Credential) -> Result<Principal> {
        let kind = credential.kind();

        let accepted = if self.config.multi_auth {
            self.config.supported_methods.contains(&kind)
        } else {
            kind == self.config.primary_method
        };
        if !accepted {
            return Err(Error::Unauthorized(format!(
                "credential scheme {kind:?} is not currently accepted"
            )));
        }

        let provider = self
            .providers
            .get(&kind)
            .ok_or_else(|| Error::Unauthorized(format!("no provider registered for {kind:?}")))?;
        provider.authenticate(credential).await
    }
}

/// Looks up user/API-key identities for the [`basic`] and [`api_key`]
/// providers. An application wires this to its own user store; this crate
/// ships no persistent user directory of its own.
pub trait UserDirectory: Send + Sync {
    /// Verify a username/password pair, returning the principal on success.
    fn verify_password(&self, username: &str, password: &str) -> Option<Principal>;

    /// Verify an API key (already hashed by the caller if `hashing` is on),
    /// returning the principal on success.
    fn verify_api_key(&self, key_or_digest: &str) -> Option<Principal>;
}

/// Resolves the shared secret used to verify an HMAC request signature
///.
pub trait HmacKeyResolver: Send + Sync {
    /// Resolve the key bytes. `None` if no key is configured.
    fn resolve_key(&self) -> Option<Vec<u8>>;
}

/// An in-memory [`UserDirectory`] for tests and small deployments.
///
/// Passwords and API keys are stored as the caller provides them — callers
/// wanting hashed-at-rest storage should hash with
/// [`crate::crypto::digest_hex`] before calling the `with_*` builders and
/// compare against the digest, consistent with `api_key.hashing` /
/// `basic.hashing` config flags.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    passwords: std::collections::HashMap<String, (String, Principal)>,
    api_keys: std::collections::HashMap<String, Principal>,
}

impl InMemoryUserDirectory {
    /// Build an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a username/password/principal triple (builder style).
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>, principal: Principal) -> Self {
        self.passwords.insert(username.into(), (password.into(), principal));
        self
    }

    /// Register an API key/principal pair (builder style).
    #[must_use]
    pub fn with_api_key(mut self, key_or_digest: impl Into<String>, principal: Principal) -> Self {
        self.api_keys.insert(key_or_digest.into(), principal);
        self
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn verify_password(&self, username: &str, password: &str) -> Option<Principal> {
        let (expected, principal) = self.passwords.get(username)?;
        if crate::crypto::constant_time_eq(expected.as_bytes(), password.as_bytes()) {
            Some(principal.clone())
        } else {
            None
        }
    }

    fn verify_api_key(&self, key_or_digest: &str) -> Option<Principal> {
        self.api_keys.get(key_or_digest).cloned()
    }
}
