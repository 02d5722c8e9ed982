//! CORS filter.

use async_trait::async_trait;

use super::{Filter, FilterOutcome};
use crate::config::CorsConfig;
use crate::error::Result;
use crate::request::{RequestContext, Response};

/// Enforces allowed origins/methods/headers and answers preflight
/// (`OPTIONS`) requests directly.
pub struct CorsFilter {
    config: CorsConfig,
}

impl CorsFilter {
    /// Build a filter from configuration. [`CorsConfig::validate`] must
    /// already have been called at config-load time to reject the
    /// `*` + credentials combination.
    #[must_use]
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.config.allowed_origins.iter().any(|allowed| {
            if allowed == "*" {
                true
            } else if let Some(suffix) = allowed.strip_prefix("*.") {
                origin
                    .strip_prefix("https://")
                    .or_else(|| origin.strip_prefix("http://"))
                    .map(|rest| rest == suffix || rest.ends_with(&format!(".{suffix}")))
                    .unwrap_or(false)
            } else {
                allowed == origin
            }
        })
    }
}

#[async_trait]
impl Filter for CorsFilter {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn before(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        if !self.config.enabled {
            return Ok(FilterOutcome::Continue);
        }

        let Some(origin) = ctx.request.header("origin").map(str::to_string) else {
            return Ok(FilterOutcome::Continue);
        };

        if !self.origin_allowed(&origin) {
            return Ok(FilterOutcome::Continue);
        }

        if ctx.request.method.eq_ignore_ascii_case("OPTIONS") {
            let mut response = Response {
                status: 204,
                headers: std::collections::HashMap::new(),
                body: None,
            };
            self.apply_headers(&origin, &mut response);
            return Ok(FilterOutcome::ShortCircuit(response));
        }

        ctx.request.headers.insert("x-cors-origin-allowed".to_string(), origin);
        Ok(FilterOutcome::Continue)
    }

    async fn after(&self, ctx: &RequestContext, response: &mut Response) {
        if !self.config.enabled {
            return;
        }
        if let Some(origin) = ctx.request.header("origin").map(str::to_string) {
            if self.origin_allowed(&origin) {
                self.apply_headers(&origin, response);
            }
        }
    }
}

impl CorsFilter {
    fn apply_headers(&self, origin: &str, response: &mut Response) {
        response.set_header_if_absent("Access-Control-Allow-Origin", origin.to_string());
        response.set_header_if_absent("Access-Control-Allow-Methods", self.config.allowed_methods.join(", "));
        response.set_header_if_absent("Access-Control-Allow-Headers", self.config.allowed_headers.join(", "));
        if !self.config.expose_headers.is_empty() {
            response.set_header_if_absent("Access-Control-Expose-Headers", self.config.expose_headers.join(", "));
        }
        if self.config.allow_credentials {
            response.set_header_if_absent("Access-Control-Allow-Credentials", "true");
        }
        response.set_header_if_absent("Access-Control-Max-Age", self.config.max_age.as_secs().to_string());
        response.set_header_if_absent("Vary", "Origin");
    }
}
