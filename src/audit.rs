//! Correlation-IDed error context and structured audit emission
//!.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::AuditConfig;
use crate::error::{Error, ErrorKind};
use crate::redact::redact_value;

/// Severity of a collected error within an [`ErrorContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational — expected, routine denial.
    Info,
    /// Operationally notable but not urgent.
    Warning,
    /// Requires operator attention (e.g. a recovered panic).
    Critical,
}

/// One collected error entry within a request's [`ErrorContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedError {
    /// Wire-safe error kind.
    pub code: String,
    /// Severity for triage.
    pub severity: Severity,
    /// The full (unredacted at this layer — redaction happens on emission)
    /// inner cause, for operator diagnosis.
    pub cause: String,
    /// Component that raised this error (`"auth"`, `"rbac"`, `"defense"`, …).
    pub component: String,
    /// Free-form structured detail.
    pub details: serde_json::Map<String, Value>,
}

/// A per-request record carrying correlation ID, collected errors,
/// performance metrics, and actionable guidance.
pub struct ErrorContext {
    /// Correlation ID threaded through every audit event for this request.
    pub correlation_id: String,
    /// Operation name (set by the pipeline once routing is known).
    pub operation: Option<String>,
    /// Errors collected across every stage this request passed through.
    pub errors: Vec<CollectedError>,
    /// Timing metrics, keyed by stage name, in microseconds.
    pub metrics: std::collections::BTreeMap<String, u64>,
    /// Operator-facing actionable guidance accumulated alongside errors.
    pub guidance: Vec<String>,
}

impl ErrorContext {
    /// Build an empty context for a fresh request.
    #[must_use]
    pub fn new(correlation_id: String) -> Self {
        Self {
            correlation_id,
            operation: None,
            errors: Vec::new(),
            metrics: std::collections::BTreeMap::new(),
            guidance: Vec::new(),
        }
    }

    /// Record an error raised by `component`, with guidance for the
    /// operator.
    pub fn record(&mut self, component: &str, err: &Error, severity: Severity) {
        self.errors.push(CollectedError {
            code: format!("{:?}", err.kind()),
            severity,
            cause: err.to_string(),
            component: component.to_string(),
            details: serde_json::Map::new(),
        });
        if let Some(g) = guidance_for(err.kind()) {
            self.guidance.push(g.to_string());
        }
    }

    /// Record a timing measurement for a named stage.
    pub fn record_timing(&mut self, stage: &str, micros: u64) {
        self.metrics.insert(stage.to_string(), micros);
    }
}

fn guidance_for(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::RateLimited => Some("client is exceeding the configured rate limit; consider backoff"),
        ErrorKind::CircuitOpen => Some("downstream operation is failing; check breaker scope health"),
        ErrorKind::ThreatBlocked => Some("request matched a threat pattern; review the source IP"),
        ErrorKind::Internal => Some("unexpected internal failure; check logs for the panic/cause"),
        _ => None,
    }
}

/// An audit event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// Authentication succeeded.
    AuthSuccess,
    /// Authentication failed.
    AuthFailure,
    /// RBAC/policy authorization decision.
    AuthzDecision,
    /// A defense filter tripped (rate limit, CSRF, threat pattern, …).
    SuspiciousActivity,
    /// Circuit breaker state transition.
    BreakerTransition,
    /// Token lifecycle event (issue/revoke/sweep).
    TokenLifecycle,
}

/// A structured record emitted to the audit sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event kind.
    pub kind: AuditEventKind,
    /// Correlation ID of the originating request, if any.
    pub correlation_id: Option<String>,
    /// Subject ID, if known at the time of the event.
    pub subject: Option<String>,
    /// Resource checked, if applicable.
    pub resource: Option<String>,
    /// Action checked, if applicable.
    pub action: Option<String>,
    /// Short operator-facing outcome description (e.g.
    /// `"rate_limit_exceeded"`, `"granted"`, `"denied"`).
    pub outcome: String,
    /// Unix-seconds timestamp.
    pub timestamp: u64,
    /// Free-form detail map, redacted before emission.
    pub detail: serde_json::Map<String, Value>,
}

/// Where audit events go. The default implementation emits structured
/// `tracing` events; callers may inject an alternative sink (a message
/// queue, a SIEM client) by implementing this trait.
pub trait AuditSink: Send + Sync {
    /// Emit one audit event.
    fn emit(&self, event: &AuditEvent);
}

/// `tracing`-backed audit sink, the crate's default.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: &AuditEvent) {
        match event.kind {
            AuditEventKind::AuthFailure | AuditEventKind::SuspiciousActivity => {
                warn!(
                    kind = ?event.kind,
                    correlation_id = event.correlation_id.as_deref().unwrap_or(""),
                    subject = event.subject.as_deref().unwrap_or(""),
                    outcome = %event.outcome,
                    "audit event"
                );
            }
            AuditEventKind::BreakerTransition => {
                error!(
                    kind = ?event.kind,
                    outcome = %event.outcome,
                    "audit event"
                );
            }
            _ => {
                info!(
                    kind = ?event.kind,
                    correlation_id = event.correlation_id.as_deref().unwrap_or(""),
                    subject = event.subject.as_deref().unwrap_or(""),
                    resource = event.resource.as_deref().unwrap_or(""),
                    action = event.action.as_deref().unwrap_or(""),
                    outcome = %event.outcome,
                    "audit event"
                );
            }
        }
    }
}

/// Emits [`AuditEvent`]s to a configured [`AuditSink`], applying redaction
/// and event-type filtering from [`AuditConfig`].
pub struct Auditor {
    sink: Box<dyn AuditSink>,
    config: AuditConfig,
}

impl Auditor {
    /// Build an auditor with the default `tracing` sink.
    #[must_use]
    pub fn new(config: AuditConfig) -> Self {
        Self {
            sink: Box::new(TracingAuditSink),
            config,
        }
    }

    /// Build an auditor with a custom sink (e.g. for tests, or to route to
    /// an external collaborator).
    #[must_use]
    pub fn with_sink(config: AuditConfig, sink: Box<dyn AuditSink>) -> Self {
        Self { sink, config }
    }

    /// Emit an event, subject to `enabled`, `event_types` filtering, and
    /// redaction.
    pub fn emit(&self, mut event: AuditEvent) {
        if !self.config.enabled {
            return;
        }
        if !self.config.event_types.is_empty() {
            let kind_str = format!("{:?}", event.kind).to_ascii_lowercase();
            if !self.config.event_types.iter().any(|t| t.eq_ignore_ascii_case(&kind_str)) {
                return;
            }
        }
        if self.config.redact_sensitive && !self.config.log_sensitive_data {
            let detail_value = Value::Object(event.detail.clone());
            let default_fields = default_redact_fields();
            let redacted = redact_value(&detail_value, &default_fields);
            if let Value::Object(map) = redacted {
                event.detail = map;
            }
        }
        self.sink.emit(&event);
    }
}

fn default_redact_fields() -> Vec<String> {
    vec![
        "password".to_string(),
        "secret".to_string(),
        "token".to_string(),
        "key".to_string(),
        "client_secret".to_string(),
        "private_key".to_string(),
        "api_key".to_string(),
    ]
}

/// Current Unix-seconds timestamp.
#[must_use]
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct CollectingSink {
        events: Arc<Mutex<Vec<AuditEvent>>>,
    }

    impl AuditSink for CollectingSink {
        fn emit(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn make_event(kind: AuditEventKind, detail: serde_json::Map<String, Value>) -> AuditEvent {
        AuditEvent {
            kind,
            correlation_id: Some("corr-1".to_string()),
            subject: Some("alice".to_string()),
            resource: None,
            action: None,
            outcome: "test".to_string(),
            timestamp: now_unix(),
            detail,
        }
    }

    #[test]
    fn auditor_redacts_sensitive_detail_fields() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = CollectingSink { events: events.clone() };
        let auditor = Auditor::with_sink(AuditConfig::default(), Box::new(sink));

        let mut detail = serde_json::Map::new();
        detail.insert("password".to_string(), Value::String("hunter2".to_string()));
        auditor.emit(make_event(AuditEventKind::AuthFailure, detail));

        let recorded = events.lock().unwrap();
        assert_eq!(recorded[0].detail["password"], "[redacted]");
    }

    #[test]
    fn auditor_respects_disabled_flag() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = CollectingSink { events: events.clone() };
        let mut config = AuditConfig::default();
        config.enabled = false;
        let auditor = Auditor::with_sink(config, Box::new(sink));

        auditor.emit(make_event(AuditEventKind::AuthSuccess, serde_json::Map::new()));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn auditor_filters_by_event_type() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = CollectingSink { events: events.clone() };
        let mut config = AuditConfig::default();
        config.event_types = vec!["auth_failure".to_string()];
        let auditor = Auditor::with_sink(config, Box::new(sink));

        auditor.emit(make_event(AuditEventKind::AuthSuccess, serde_json::Map::new()));
        assert!(events.lock().unwrap().is_empty());

        auditor.emit(make_event(AuditEventKind::AuthFailure, serde_json::Map::new()));
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn error_context_records_guidance_for_rate_limited() {
        let mut ctx = ErrorContext::new("corr-1".to_string());
        ctx.record(
            "defense",
            &Error::RateLimited { retry_after_secs: 30 },
            Severity::Warning,
        );
        assert_eq!(ctx.errors.len(), 1);
        assert!(!ctx.guidance.is_empty());
    }
}
