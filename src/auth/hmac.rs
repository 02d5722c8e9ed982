//! HMAC request-signature provider.
//!
//! Verifies a request signature in constant time, with a replay-proof
//! nonce cache backed by a `DashMap`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{AuthProvider, HmacKeyResolver};
use crate::config::{CredentialKind, HmacConfig};
use crate::credential::Credential;
use crate::crypto::{self, HmacAlgorithm};
use crate::error::{Error, Result};
use crate::principal::Principal;

/// Tracks recently seen nonces to reject replayed signed requests.
///
/// Entries older than the configured skew window are pruned lazily on
/// insert, mirroring the lazy-eviction pattern in [`crate::token`].
pub struct NonceCache {
    seen: DashMap<String, u64>,
}

impl NonceCache {
    /// Build an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self { seen: DashMap::new() }
    }

    /// Record `nonce` if unseen within `window`. Returns `false` if it was
    /// already present (a replay).
    pub fn check_and_insert(&self, nonce: &str, window: Duration) -> bool {
        let now = now_secs();
        let window_secs = window.as_secs();
        self.seen.retain(|_, seen_at| now.saturating_sub(*seen_at) <= window_secs);

        if self.seen.contains_key(nonce) {
            false
        } else {
            self.seen.insert(nonce.to_string(), now);
            true
        }
    }
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Verifies signed requests: HMAC over a canonical string of
/// `timestamp\nnonce\nMETHOD\nPATH\nheader:value\n...`, with timestamp-skew
/// and nonce-replay checks. The canonical string covers the request method
/// and path along with every signed header's actual value, so tampering
/// with any of them — not just stripping the header — invalidates the
/// signature.
pub struct HmacProvider {
    key_resolver: Arc<dyn HmacKeyResolver>,
    nonce_cache: Arc<NonceCache>,
    config: HmacConfig,
    /// The subject this shared-secret credential authenticates as. A
    /// deployment with multiple HMAC clients should inject one provider
    /// instance per client key via distinct `AuthProviderSet`s, or extend
    /// [`HmacKeyResolver`] to return a `(subject, key)` pair.
    subject_id: String,
}

impl HmacProvider {
    /// Build a provider for a single shared-secret client.
    #[must_use]
    pub fn new(
        key_resolver: Arc<dyn HmacKeyResolver>,
        nonce_cache: Arc<NonceCache>,
        config: HmacConfig,
        subject_id: impl Into<String>,
    ) -> Self {
        Self {
            key_resolver,
            nonce_cache,
            config,
            subject_id: subject_id.into(),
        }
    }

    fn canonical_string(
        &self,
        timestamp: &str,
        nonce: &str,
        method: &str,
        path: &str,
        signed_headers: &[(String, String)],
    ) -> String {
        let mut parts = vec![timestamp.to_string(), nonce.to_string(), method.to_string(), path.to_string()];
        for (name, value) in signed_headers {
            parts.push(format!("{name}:{value}"));
        }
        parts.join("\n")
    }
}

#[async_trait]
impl AuthProvider for HmacProvider {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Hmac
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Principal> {
        let Credential::Hmac {
            signature,
            timestamp,
            nonce,
            method,
            path,
            signed_headers,
        } = credential
        else {
            return Err(Error::Internal(
                "HmacProvider received a non-Hmac credential".to_string(),
            ));
        };

        let key = self
            .key_resolver
            .resolve_key()
            .ok_or_else(|| Error::Unauthorized("no HMAC key configured".to_string()))?;

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| Error::Unauthorized("malformed HMAC timestamp".to_string()))?;
        let now = now_secs() as i64;
        if (now - ts).unsigned_abs() > self.config.skew.as_secs() {
            return Err(Error::Unauthorized("HMAC timestamp outside allowed skew".to_string()));
        }

        if !self.nonce_cache.check_and_insert(nonce, self.config.skew) {
            return Err(Error::Unauthorized("HMAC nonce replayed".to_string()));
        }

        let algorithm = HmacAlgorithm::parse(&self.config.algorithm)
            .ok_or_else(|| Error::Unauthorized("unsupported HMAC algorithm configured".to_string()))?;
        let message = self.canonical_string(timestamp, nonce, method, path, signed_headers);

        if !crypto::hmac_verify(algorithm, &key, message.as_bytes(), signature) {
            return Err(Error::Unauthorized("HMAC signature mismatch".to_string()));
        }

        Ok(Principal::new(self.subject_id.clone()))
    }
}
