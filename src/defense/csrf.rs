//! CSRF filter.
//!
//! Tokens are minted from [`crate::crypto::random_nonce`] — a
//! cryptographically-random value, never a timestamp composition: a
//! predictable token defeats the whole point of the double-submit check.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Filter, FilterOutcome};
use crate::config::CsrfConfig;
use crate::crypto;
use crate::error::{Error, Result};
use crate::request::RequestContext;

struct IssuedToken {
    expires_at_secs: u64,
}

/// Issues and verifies anti-CSRF tokens using the double-submit pattern: a
/// token minted on a safe request must be echoed back in a header or form
/// field on the next unsafe one.
pub struct CsrfFilter {
    config: CsrfConfig,
    issued: DashMap<String, IssuedToken>,
}

impl CsrfFilter {
    /// Build a filter from configuration.
    #[must_use]
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            config,
            issued: DashMap::new(),
        }
    }

    /// Mint and register a fresh token, to be handed back to the client
    /// (typically as a cookie or embedded in a rendered form).
    pub fn issue_token(&self) -> String {
        let token = crypto::random_nonce();
        self.issued.insert(
            token.clone(),
            IssuedToken {
                expires_at_secs: now_secs() + self.config.token_ttl.as_secs(),
            },
        );
        token
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.config
            .exempt_paths
            .iter()
            .any(|exempt| path == exempt || path.starts_with(exempt.trim_end_matches('/')))
    }

    fn token_from_request(&self, ctx: &RequestContext) -> Option<String> {
        if let Some(value) = ctx.request.header(&self.config.header.to_lowercase()) {
            return Some(value.to_string());
        }
        ctx.request
            .body
            .as_ref()
            .and_then(|b| b.get(&self.config.field))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    fn verify(&self, token: &str) -> bool {
        let now = now_secs();
        let still_valid = self.issued.get(token).is_some_and(|entry| entry.expires_at_secs > now);
        self.issued.remove(token);
        still_valid
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[async_trait]
impl Filter for CsrfFilter {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn before(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        if !self.config.enabled {
            return Ok(FilterOutcome::Continue);
        }
        if self
            .config
            .safe_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&ctx.request.method))
        {
            return Ok(FilterOutcome::Continue);
        }
        if self.is_exempt(&ctx.request.path) {
            return Ok(FilterOutcome::Continue);
        }

        let token = self
            .token_from_request(ctx)
            .ok_or_else(|| Error::CsrfFailed("no CSRF token presented".to_string()))?;

        if self.verify(&token) {
            Ok(FilterOutcome::Continue)
        } else {
            Err(Error::CsrfFailed("CSRF token invalid, expired, or already used".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use std::collections::HashMap;

    fn request(method: &str, header: Option<(&str, &str)>) -> Request {
        let mut headers = HashMap::new();
        if let Some((name, value)) = header {
            headers.insert(name.to_string(), value.to_string());
        }
        Request {
            method: method.to_string(),
            path: "/transfer".to_string(),
            headers,
            query: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
            remote_addr: None,
            tls_peer_chain: None,
        }
    }

    #[tokio::test]
    async fn safe_method_is_never_challenged() {
        let filter = CsrfFilter::new(CsrfConfig::default());
        let mut ctx = RequestContext::new(request("GET", None));
        assert!(matches!(filter.before(&mut ctx).await.unwrap(), FilterOutcome::Continue));
    }

    #[tokio::test]
    async fn missing_token_on_unsafe_method_is_rejected() {
        let filter = CsrfFilter::new(CsrfConfig::default());
        let mut ctx = RequestContext::new(request("POST", None));
        assert!(matches!(filter.before(&mut ctx).await, Err(Error::CsrfFailed(_))));
    }

    #[tokio::test]
    async fn issued_token_is_accepted_exactly_once() {
        let filter = CsrfFilter::new(CsrfConfig::default());
        let token = filter.issue_token();
        let mut ctx = RequestContext::new(request("POST", Some(("x-csrf-token", &token))));
        assert!(matches!(filter.before(&mut ctx).await.unwrap(), FilterOutcome::Continue));

        let mut replay_ctx = RequestContext::new(request("POST", Some(("x-csrf-token", &token))));
        assert!(matches!(filter.before(&mut replay_ctx).await, Err(Error::CsrfFailed(_))));
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let filter = CsrfFilter::new(CsrfConfig::default());
        let mut ctx = RequestContext::new(request("POST", Some(("x-csrf-token", "not-a-real-token"))));
        assert!(matches!(filter.before(&mut ctx).await, Err(Error::CsrfFailed(_))));
    }

    #[tokio::test]
    async fn exempt_path_skips_the_check() {
        let mut config = CsrfConfig::default();
        config.exempt_paths = vec!["/webhooks".to_string()];
        let filter = CsrfFilter::new(config);
        let mut request = request("POST", None);
        request.path = "/webhooks/stripe".to_string();
        let mut ctx = RequestContext::new(request);
        assert!(matches!(filter.before(&mut ctx).await.unwrap(), FilterOutcome::Continue));
    }

    #[test]
    fn two_issued_tokens_are_distinct() {
        let filter = CsrfFilter::new(CsrfConfig::default());
        assert_ne!(filter.issue_token(), filter.issue_token());
    }
}
