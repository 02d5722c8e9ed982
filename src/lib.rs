//! authguard — a transport-agnostic authentication, RBAC/policy
//! authorization, and request-defense middleware core.
//!
//! # Modules
//!
//! - [`credential`] / [`auth`]: extract a [`credential::Credential`] from a
//!   request and verify it against one of the configured schemes.
//! - [`rbac`] / [`policy`]: resolve a principal's permissions and evaluate
//!   deny-overrides policy rules against a requested resource/action.
//! - [`defense`]: pluggable request/response filters (rate limiting, CORS,
//!   CSRF, threat detection, security headers, input validation).
//! - [`breaker`]: circuit breaker registry for protecting downstream calls
//!   a handler makes after this core grants access.
//! - [`pipeline`]: composes all of the above into the one entry point a
//!   transport adapter calls per request.
//! - [`audit`]: correlation-IDed error context and structured audit events.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod auth;
pub mod breaker;
pub mod cli;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod defense;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod principal;
pub mod rbac;
pub mod redact;
pub mod request;
pub mod token;

pub use error::{Error, Result};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize `tracing` output, with an env-filter-plus-format switch
/// between plain and JSON log lines.
///
/// # Errors
///
/// Never actually fails today (kept as a `Result` for symmetry with the
/// rest of the crate's fallible setup paths) — reserved for a future
/// non-default subscriber that can fail to initialize.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
