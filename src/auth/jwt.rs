//! JWT bearer-token provider.
//!
//! Decodes the header, validates signature and standard claims, and
//! enforces issuer/audience and clock-skew bounds — entirely offline
//! against injected key material, since this core never makes outbound
//! network calls (no live JWKS HTTP fetch).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::AuthProvider;
use crate::config::{CredentialKind, JwtConfig};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::principal::Principal;

/// Resolves the decoding key for a given algorithm name, without ever
/// fetching it over the network — the caller is responsible for loading
/// key material (a shared secret, or an RSA/EC public key) ahead of time.
pub trait JwtKeyResolver: Send + Sync {
    /// Resolve the decoding key for `algorithm` (`"HS256"`, `"RS256"`, …).
    /// `None` if no key is configured for that algorithm.
    fn resolve(&self, algorithm: &str) -> Option<DecodingKey>;
}

/// A resolver backed by a single shared secret, for `HS256`/`HS384`/`HS512`.
pub struct SharedSecretResolver {
    secret: Vec<u8>,
}

impl SharedSecretResolver {
    /// Build a resolver around `secret`.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }
}

impl JwtKeyResolver for SharedSecretResolver {
    fn resolve(&self, algorithm: &str) -> Option<DecodingKey> {
        match algorithm {
            "HS256" | "HS384" | "HS512" => Some(DecodingKey::from_secret(&self.secret)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    nbf: Option<u64>,
    #[serde(default)]
    iat: Option<u64>,
}

/// Verifies JWT bearer tokens against injected key material.
pub struct JwtProvider {
    key_resolver: Arc<dyn JwtKeyResolver>,
    config: JwtConfig,
}

impl JwtProvider {
    /// Build a provider with the given key resolver and configuration.
    #[must_use]
    pub fn new(key_resolver: Arc<dyn JwtKeyResolver>, config: JwtConfig) -> Self {
        Self { key_resolver, config }
    }
}

#[async_trait]
impl AuthProvider for JwtProvider {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Bearer
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Principal> {
        let Credential::Bearer { token, .. } = credential else {
            return Err(Error::Internal(
                "JwtProvider received a non-Bearer credential".to_string(),
            ));
        };

        let header = decode_header(token)
            .map_err(|e| Error::Unauthorized(format!("malformed JWT header: {e}")))?;
        let alg_name = format!("{:?}", header.alg);
        if !self.config.algorithm_allow_list.iter().any(|a| a.eq_ignore_ascii_case(&alg_name)) {
            return Err(Error::Unauthorized(format!(
                "JWT algorithm {alg_name} not in the configured allow-list"
            )));
        }

        let algorithm = parse_algorithm(&alg_name)
            .ok_or_else(|| Error::Unauthorized(format!("unsupported JWT algorithm {alg_name}")))?;
        let key = self
            .key_resolver
            .resolve(&alg_name)
            .ok_or_else(|| Error::Unauthorized("no key material configured for JWT algorithm".to_string()))?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = self.config.leeway.as_secs();
        validation.validate_exp = self.config.require_expiry;
        validation.validate_nbf = true;
        validation.required_spec_claims.clear();
        if let Some(ref issuer) = self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if !self.config.audience.is_empty() {
            validation.set_audience(&self.config.audience);
        } else {
            validation.validate_aud = false;
        }

        let token_data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| Error::Unauthorized(format!("JWT verification failed: {e}")))?;
        let claims = token_data.claims;

        if self.config.require_expiry && claims.exp.is_none() {
            return Err(Error::Unauthorized("JWT missing required 'exp' claim".to_string()));
        }
        if let Some(exp) = claims.exp {
            if exp <= now_secs() {
                return Err(Error::Expired);
            }
        }

        let mut principal = Principal::new(claims.sub).with_roles(claims.roles);
        principal.email = claims.email;
        principal.display_name = claims.name;
        Ok(principal)
    }
}

fn parse_algorithm(name: &str) -> Option<Algorithm> {
    match name {
        "HS256" => Some(Algorithm::HS256),
        "HS384" => Some(Algorithm::HS384),
        "HS512" => Some(Algorithm::HS512),
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        "ES256" => Some(Algorithm::ES256),
        "ES384" => Some(Algorithm::ES384),
        _ => None,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
