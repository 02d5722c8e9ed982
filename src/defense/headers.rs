//! Security response headers filter.

use async_trait::async_trait;

use super::{Filter, FilterOutcome};
use crate::config::SecurityHeadersConfig;
use crate::error::Result;
use crate::request::{RequestContext, Response};

/// Stamps a fixed set of security headers onto every response. Never
/// overwrites a header the handler already set
/// ([`Response::set_header_if_absent`]).
pub struct SecurityHeadersFilter {
    config: SecurityHeadersConfig,
}

impl SecurityHeadersFilter {
    /// Build a filter from configuration.
    #[must_use]
    pub fn new(config: SecurityHeadersConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Filter for SecurityHeadersFilter {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn before(&self, _ctx: &mut RequestContext) -> Result<FilterOutcome> {
        Ok(FilterOutcome::Continue)
    }

    async fn after(&self, _ctx: &RequestContext, response: &mut Response) {
        if !self.config.enabled {
            return;
        }
        if let Some(ref v) = self.config.content_security_policy {
            response.set_header_if_absent("Content-Security-Policy", v.clone());
        }
        if let Some(ref v) = self.config.x_frame_options {
            response.set_header_if_absent("X-Frame-Options", v.clone());
        }
        if let Some(ref v) = self.config.x_content_type_options {
            response.set_header_if_absent("X-Content-Type-Options", v.clone());
        }
        if let Some(ref v) = self.config.x_xss_protection {
            response.set_header_if_absent("X-XSS-Protection", v.clone());
        }
        if let Some(ref v) = self.config.strict_transport_security {
            response.set_header_if_absent("Strict-Transport-Security", v.clone());
        }
        if let Some(ref v) = self.config.referrer_policy {
            response.set_header_if_absent("Referrer-Policy", v.clone());
        }
        if let Some(ref v) = self.config.permissions_policy {
            response.set_header_if_absent("Permissions-Policy", v.clone());
        }
        for (name, value) in &self.config.custom {
            response.set_header_if_absent(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use std::collections::HashMap;

    fn ctx() -> RequestContext {
        RequestContext::new(Request {
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
            remote_addr: None,
            tls_peer_chain: None,
        })
    }

    #[tokio::test]
    async fn default_headers_are_applied() {
        let filter = SecurityHeadersFilter::new(SecurityHeadersConfig::default());
        let mut response = Response::default();
        filter.after(&ctx(), &mut response).await;
        assert_eq!(response.headers.get("X-Frame-Options"), Some(&"DENY".to_string()));
        assert_eq!(response.headers.get("X-Content-Type-Options"), Some(&"nosniff".to_string()));
    }

    #[tokio::test]
    async fn handler_set_header_is_never_overwritten() {
        let filter = SecurityHeadersFilter::new(SecurityHeadersConfig::default());
        let mut response = Response::default();
        response.headers.insert("X-Frame-Options".to_string(), "SAMEORIGIN".to_string());
        filter.after(&ctx(), &mut response).await;
        assert_eq!(response.headers.get("X-Frame-Options"), Some(&"SAMEORIGIN".to_string()));
    }

    #[tokio::test]
    async fn disabled_filter_sets_nothing() {
        let filter = SecurityHeadersFilter::new(SecurityHeadersConfig {
            enabled: false,
            ..SecurityHeadersConfig::default()
        });
        let mut response = Response::default();
        filter.after(&ctx(), &mut response).await;
        assert!(response.headers.is_empty());
    }

    #[tokio::test]
    async fn custom_headers_are_applied() {
        let mut config = SecurityHeadersConfig::default();
        config.custom.insert("X-Service".to_string(), "authguard".to_string());
        let filter = SecurityHeadersFilter::new(config);
        let mut response = Response::default();
        filter.after(&ctx(), &mut response).await;
        assert_eq!(response.headers.get("X-Service"), Some(&"authguard".to_string()));
    }
}
