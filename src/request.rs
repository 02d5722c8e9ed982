//! Transport-agnostic request/response surface.
//!
//! The core never opens a socket or parses a wire format itself — an HTTP
//! server adapter is expected to populate [`Request`] and translate
//! [`Response`] back to its own types, the way an `axum` middleware layer
//! translates into `axum::http::Request`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::ErrorKind;
use crate::principal::Principal;

/// An inbound request, decoupled from any concrete HTTP server crate.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method (`"GET"`, `"POST"`, …).
    pub method: String,
    /// Request path, not including query string.
    pub path: String,
    /// Header names are lower-cased by the adapter before construction.
    pub headers: HashMap<String, String>,
    /// Query string parameters.
    pub query: HashMap<String, String>,
    /// Cookie name -> value.
    pub cookies: HashMap<String, String>,
    /// Parsed body, if any (body parsing itself is out of scope — the
    /// adapter hands over an already-parsed value).
    pub body: Option<Value>,
    /// Remote socket address, if known.
    pub remote_addr: Option<String>,
    /// TLS peer certificate chain (DER, leaf first), if the connection is
    /// mTLS and a client certificate was presented.
    pub tls_peer_chain: Option<Vec<Vec<u8>>>,
}

impl Request {
    /// Case-insensitive header lookup (expects an already-lowercased key).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Query parameter lookup.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Cookie lookup.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Resolve the client IP from `X-Forwarded-For` (leftmost trusted
    /// value) falling back to the socket's remote address.
    #[must_use]
    pub fn client_ip(&self) -> Option<&str> {
        if let Some(xff) = self.header("x-forwarded-for") {
            if let Some(ip) = crate::credential::leftmost_forwarded_ip(xff) {
                return Some(ip);
            }
        }
        self.remote_addr.as_deref()
    }
}

/// An outbound response, decoupled from any concrete HTTP server crate.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Response headers. Filters must never overwrite a header the handler
    /// already set.
    pub headers: HashMap<String, String>,
    /// Response body, if any.
    pub body: Option<Value>,
}

impl Response {
    /// Build a response for the given error kind, honoring secure error
    /// mode.
    #[must_use]
    pub fn from_error_kind(kind: ErrorKind, correlation_id: &str, secure_error_mode: bool, now_unix: u64) -> Self {
        let mut body = serde_json::json!({
            "error": kind.public_message(),
            "timestamp": now_unix,
        });
        if !secure_error_mode {
            body["correlation_id"] = Value::String(correlation_id.to_string());
        }
        Self {
            status: kind.status_code(),
            headers: HashMap::new(),
            body: Some(body),
        }
    }

    /// Set a header only if it is not already present (never clobbers a
    /// handler-set header).
    pub fn set_header_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.entry(name.into()).or_insert_with(|| value.into());
    }
}

/// Request-scoped state threaded through the defense pipeline and attached
/// handler. Exclusively owned by the request's lifetime.
pub struct RequestContext {
    /// The inbound request.
    pub request: Request,
    /// Correlation ID for this request's error context and audit trail.
    pub correlation_id: String,
    /// The authenticated principal, once attached by the pipeline.
    principal: Option<Principal>,
    /// Request-scoped error context.
    pub errors: crate::audit::ErrorContext,
    /// Absolute deadline for the whole request, if one was set.
    pub deadline: Option<Instant>,
    /// Cancellation flag, checked by suspension points.
    cancelled: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl RequestContext {
    /// Build a fresh context for an inbound request.
    #[must_use]
    pub fn new(request: Request) -> Self {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        Self {
            request,
            errors: crate::audit::ErrorContext::new(correlation_id.clone()),
            correlation_id,
            principal: None,
            deadline: None,
            cancelled: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Attach a deadline derived from a remaining duration.
    #[must_use]
    pub fn with_deadline(mut self, remaining: Duration) -> Self {
        self.deadline = Some(Instant::now() + remaining);
        self
    }

    /// Attach the authenticated principal (well-known keys: subject ID,
    /// role set, permission set — accessed via [`RequestContext::principal`]).
    pub fn attach_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Retrieve the attached principal, if authentication succeeded.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// `true` once a principal has been attached.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// A handle that can be used to request cancellation from outside the
    /// task driving this request.
    #[must_use]
    pub fn cancellation_handle(&self) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
        self.cancelled.clone()
    }

    /// `true` if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Remaining time until the request deadline, or `None` if unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}
