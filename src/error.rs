//! Error taxonomy for the auth/authz/defense core.
//!
//! `Error` carries the full inner cause (for `tracing`/audit consumption);
//! [`Error::kind`] maps every variant onto the small, wire-safe [`ErrorKind`]
//! enumerated in the error envelope contract. `Display` on `Error` itself may
//! include detail — callers building a wire [`Response`](crate::request::Response)
//! must go through [`ErrorKind::public_message`], never `Error::to_string`,
//! when `secure_error_mode` is enabled.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the auth/authz/defense core.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (role cycles, invalid CORS combination, bad regex, …).
    #[error("Configuration error: {0}")]
    Config(String),

    /// No credential could be extracted from the request and anonymous
    /// access is not enabled.
    #[error("Credential missing")]
    CredentialMissing,

    /// A credential was present but malformed (e.g. wrong `Authorization`
    /// prefix) — never silently falls through to the next extractor.
    #[error("Credential malformed: {0}")]
    CredentialMalformed(String),

    /// Signature, password, or MAC verification failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The credential verified but the underlying token/cert has expired.
    #[error("Expired")]
    Expired,

    /// The credential verified but the underlying token has been revoked.
    #[error("Revoked")]
    Revoked,

    /// The principal's account/token is valid but marked inactive.
    #[error("Inactive")]
    Inactive,

    /// RBAC denied: the principal lacks the required permission.
    #[error("Insufficient permissions for {resource}:{action}")]
    InsufficientPermissions {
        /// Resource pattern that was checked.
        resource: String,
        /// Action pattern that was checked.
        action: String,
    },

    /// Policy evaluator denied the request (deny rule matched, or nothing matched).
    #[error("Policy denied: {0}")]
    PolicyDenied(String),

    /// CSRF token missing, mismatched, or expired.
    #[error("CSRF check failed: {0}")]
    CsrfFailed(String),

    /// Rate limiter rejected the request.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the caller may retry.
        retry_after_secs: u64,
    },

    /// Threat-pattern scanner matched a blocked pattern.
    #[error("Threat detected: {0}")]
    ThreatDetected(String),

    /// Input validation failed (size limits, invalid UTF-8, nesting depth, …).
    #[error("Input invalid: {0}")]
    InputInvalid(String),

    /// Circuit breaker is open for the named scope.
    #[error("Circuit open for '{scope}', retry after {retry_after_ms}ms")]
    CircuitOpen {
        /// Breaker scope name.
        scope: String,
        /// Milliseconds until a probe is admitted.
        retry_after_ms: u64,
    },

    /// A bounded operation exceeded its deadline.
    #[error("Timeout")]
    Timeout,

    /// The request context's cancellation signal fired.
    #[error("Cancelled")]
    Cancelled,

    /// Recovered panic or other unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error (config file loading, etc).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The small set of wire-safe error kinds from the error envelope contract.
///
/// Every [`Error`] variant maps onto exactly one of these; the wire response
/// never carries more detail than this kind's `public_message` + an optional
/// correlation ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Config / internal invariant failure.
    Internal,
    /// Request was malformed or failed input validation.
    InputInvalid,
    /// No credential found.
    CredentialMissing,
    /// Credential present but malformed.
    CredentialMalformed,
    /// Generic authentication-required outcome (secure-error-mode collapses
    /// Unauthorized/Expired/Revoked/Inactive into this on the wire, while the
    /// true cause is still recorded in the `ErrorContext`).
    AuthenticationRequired,
    /// RBAC/policy denied the action.
    AccessDenied,
    /// CSRF check failed.
    CsrfFailed,
    /// Rate limit exceeded.
    RateLimited,
    /// Threat pattern matched and the filter is configured to block.
    ThreatBlocked,
    /// Circuit breaker open.
    CircuitOpen,
    /// Deadline exceeded.
    Timeout,
    /// Request cancelled by the caller.
    Cancelled,
}

impl ErrorKind {
    /// HTTP-style status code from the error envelope contract (§6).
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::InputInvalid => 400,
            Self::CredentialMissing
            | Self::CredentialMalformed
            | Self::AuthenticationRequired => 401,
            Self::AccessDenied | Self::CsrfFailed | Self::ThreatBlocked => 403,
            Self::RateLimited => 429,
            Self::Cancelled => 499,
            Self::CircuitOpen => 503,
            Self::Timeout => 504,
            Self::Internal => 500,
        }
    }

    /// The generic, secret-free string shown on the wire in secure error mode.
    #[must_use]
    pub fn public_message(self) -> &'static str {
        match self {
            Self::InputInvalid => "Invalid request",
            Self::CredentialMissing | Self::CredentialMalformed => "Authentication required",
            Self::AuthenticationRequired => "Authentication required",
            Self::AccessDenied => "Access denied",
            Self::CsrfFailed => "CSRF validation failed",
            Self::RateLimited => "Rate limit exceeded",
            Self::ThreatBlocked => "Request blocked",
            Self::CircuitOpen => "Service temporarily unavailable",
            Self::Timeout => "Request timed out",
            Self::Cancelled => "Request cancelled",
            Self::Internal => "Internal error",
        }
    }
}

impl Error {
    /// Map this error onto its wire-safe [`ErrorKind`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Internal(_) | Self::Io(_) | Self::Json(_) => {
                ErrorKind::Internal
            }
            Self::CredentialMissing => ErrorKind::CredentialMissing,
            Self::CredentialMalformed(_) => ErrorKind::CredentialMalformed,
            Self::Unauthorized(_) | Self::Expired | Self::Revoked | Self::Inactive => {
                ErrorKind::AuthenticationRequired
            }
            Self::InsufficientPermissions { .. } | Self::PolicyDenied(_) => {
                ErrorKind::AccessDenied
            }
            Self::CsrfFailed(_) => ErrorKind::CsrfFailed,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ThreatDetected(_) => ErrorKind::ThreatBlocked,
            Self::InputInvalid(_) => ErrorKind::InputInvalid,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::Timeout => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// `true` for variants that must never be retried automatically by the
    /// middleware itself (all of them — retries belong to the caller).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        true
    }
}
