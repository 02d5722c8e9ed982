//! Input validation limits filter: string/structure checks extended with
//! the size and nesting limits named in configuration.

use async_trait::async_trait;
use serde_json::Value;

use super::{Filter, FilterOutcome};
use crate::config::InputValidationConfig;
use crate::error::{Error, Result};
use crate::request::RequestContext;

/// Enforces request size, structure, and content-type limits before a
/// request reaches a handler.
pub struct InputValidationFilter {
    config: InputValidationConfig,
}

impl InputValidationFilter {
    /// Build a filter from configuration.
    #[must_use]
    pub fn new(config: InputValidationConfig) -> Self {
        Self { config }
    }

    fn check_string(&self, s: &str) -> Option<String> {
        if s.len() > self.config.max_string_length {
            return Some(format!("string field exceeds max length of {}", self.config.max_string_length));
        }
        if self.config.require_utf8 && s.contains('\u{FFFD}') {
            return Some("string field contains a UTF-8 replacement character".to_string());
        }
        if s.chars().any(|c| self.config.disallowed_chars.contains(&c)) {
            return Some("string field contains a disallowed character".to_string());
        }
        None
    }

    fn check_value(&self, value: &Value, depth: usize) -> Option<String> {
        if depth > self.config.max_object_depth {
            return Some(format!("structure exceeds max nesting depth of {}", self.config.max_object_depth));
        }
        match value {
            Value::String(s) => self.check_string(s),
            Value::Array(items) => {
                if items.len() > self.config.max_array_length {
                    return Some(format!("array exceeds max length of {}", self.config.max_array_length));
                }
                items.iter().find_map(|v| self.check_value(v, depth + 1))
            }
            Value::Object(map) => map
                .iter()
                .find_map(|(k, v)| self.check_string(k).or_else(|| self.check_value(v, depth + 1))),
            _ => None,
        }
    }

    fn content_type_allowed(&self, content_type: &str) -> bool {
        if self.config.allowed_content_types.is_empty() {
            return true;
        }
        let base = content_type.split(';').next().unwrap_or(content_type).trim();
        self.config.allowed_content_types.iter().any(|allowed| allowed == base)
    }
}

#[async_trait]
impl Filter for InputValidationFilter {
    fn name(&self) -> &'static str {
        "input_validation"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn before(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        if !self.config.enabled {
            return Ok(FilterOutcome::Continue);
        }

        let mut violation = None;

        if ctx.request.query.len() > self.config.max_query_params {
            violation = Some(format!("too many query parameters (max {})", self.config.max_query_params));
        }

        if violation.is_none() {
            let header_bytes: usize = ctx.request.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
            if header_bytes > self.config.max_header_size {
                violation = Some(format!("headers exceed max size of {} bytes", self.config.max_header_size));
            }
        }

        if violation.is_none() {
            if let Some(content_type) = ctx.request.header("content-type") {
                if !self.content_type_allowed(content_type) {
                    violation = Some(format!("unsupported content type '{content_type}'"));
                }
            }
        }

        if violation.is_none() {
            if let Some(ref body) = ctx.request.body {
                let serialized_len = serde_json::to_vec(body).map(|b| b.len()).unwrap_or(0);
                if serialized_len > self.config.max_request_size {
                    violation = Some(format!("request body exceeds max size of {} bytes", self.config.max_request_size));
                } else if let Value::Object(map) = body {
                    if map.len() > self.config.max_form_fields {
                        violation = Some(format!("too many fields (max {})", self.config.max_form_fields));
                    }
                }
                if violation.is_none() {
                    violation = self.check_value(body, 0);
                }
            }
        }

        match violation {
            Some(message) if self.config.block_on_violation => Err(Error::InputInvalid(message)),
            _ => Ok(FilterOutcome::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use std::collections::HashMap;

    fn config() -> InputValidationConfig {
        InputValidationConfig {
            enabled: true,
            max_request_size: 1024,
            max_header_size: 1024,
            max_query_params: 5,
            max_form_fields: 10,
            max_string_length: 32,
            max_object_depth: 3,
            max_array_length: 10,
            allowed_content_types: vec!["application/json".to_string()],
            disallowed_chars: vec!['\0'],
            require_utf8: true,
            strict_mode: true,
            block_on_violation: true,
            max_decode_iterations: 2,
        }
    }

    fn request() -> Request {
        Request {
            method: "POST".to_string(),
            path: "/orders".to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
            remote_addr: None,
            tls_peer_chain: None,
        }
    }

    #[tokio::test]
    async fn clean_request_passes() {
        let filter = InputValidationFilter::new(config());
        let mut req = request();
        req.body = Some(serde_json::json!({"item": "widget"}));
        let mut ctx = RequestContext::new(req);
        assert!(matches!(filter.before(&mut ctx).await.unwrap(), FilterOutcome::Continue));
    }

    #[tokio::test]
    async fn too_many_query_params_is_rejected() {
        let filter = InputValidationFilter::new(config());
        let mut req = request();
        for i in 0..10 {
            req.query.insert(format!("p{i}"), "v".to_string());
        }
        let mut ctx = RequestContext::new(req);
        assert!(matches!(filter.before(&mut ctx).await, Err(Error::InputInvalid(_))));
    }

    #[tokio::test]
    async fn oversized_string_field_is_rejected() {
        let filter = InputValidationFilter::new(config());
        let mut req = request();
        req.body = Some(serde_json::json!({"note": "x".repeat(64)}));
        let mut ctx = RequestContext::new(req);
        assert!(matches!(filter.before(&mut ctx).await, Err(Error::InputInvalid(_))));
    }

    #[tokio::test]
    async fn excessive_nesting_is_rejected() {
        let filter = InputValidationFilter::new(config());
        let mut req = request();
        req.body = Some(serde_json::json!({"a": {"b": {"c": {"d": "too deep"}}}}));
        let mut ctx = RequestContext::new(req);
        assert!(matches!(filter.before(&mut ctx).await, Err(Error::InputInvalid(_))));
    }

    #[tokio::test]
    async fn disallowed_content_type_is_rejected() {
        let filter = InputValidationFilter::new(config());
        let mut req = request();
        req.headers.insert("content-type".to_string(), "text/xml".to_string());
        let mut ctx = RequestContext::new(req);
        assert!(matches!(filter.before(&mut ctx).await, Err(Error::InputInvalid(_))));
    }

    #[tokio::test]
    async fn replacement_character_is_rejected_when_utf8_required() {
        let filter = InputValidationFilter::new(config());
        let mut req = request();
        req.body = Some(serde_json::json!({"note": "mojibake: \u{FFFD}"}));
        let mut ctx = RequestContext::new(req);
        assert!(matches!(filter.before(&mut ctx).await, Err(Error::InputInvalid(_))));
    }

    #[tokio::test]
    async fn replacement_character_is_allowed_when_not_required() {
        let mut cfg = config();
        cfg.require_utf8 = false;
        let filter = InputValidationFilter::new(cfg);
        let mut req = request();
        req.body = Some(serde_json::json!({"note": "mojibake: \u{FFFD}"}));
        let mut ctx = RequestContext::new(req);
        assert!(matches!(filter.before(&mut ctx).await.unwrap(), FilterOutcome::Continue));
    }

    #[tokio::test]
    async fn non_blocking_mode_allows_violations_through() {
        let mut cfg = config();
        cfg.block_on_violation = false;
        let filter = InputValidationFilter::new(cfg);
        let mut req = request();
        req.body = Some(serde_json::json!({"note": "x".repeat(64)}));
        let mut ctx = RequestContext::new(req);
        assert!(matches!(filter.before(&mut ctx).await.unwrap(), FilterOutcome::Continue));
    }
}
