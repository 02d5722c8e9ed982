//! The defense pipeline: pluggable request/response filters
//!.

pub mod cors;
pub mod csrf;
pub mod headers;
pub mod rate_limit;
pub mod skip_paths;
pub mod threat;
pub mod validation;

use async_trait::async_trait;

use crate::error::Result;
use crate::request::{RequestContext, Response};

/// What a filter decided for the current request.
pub enum FilterOutcome {
    /// Proceed to the next filter / the handler.
    Continue,
    /// Stop the chain immediately and return this response (e.g. a CORS
    /// preflight reply, or a rejection).
    ShortCircuit(Response),
}

/// A single stage of the defense pipeline.
///
/// Filters run in priority order on the way in (`before`); filters that also
/// decorate the outgoing response (security headers, CORS) implement
/// `after` as well. A short-circuiting filter's own `after` still runs, so
/// it can stamp headers on its own rejection response.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Stable name, used in audit events and logs.
    fn name(&self) -> &'static str;

    /// Where this filter sits in the chain, lowest first. CORS needs to
    /// answer preflights before anything else looks at the request; security
    /// headers run last so nothing downstream can undo them. Ties fall back
    /// to construction order.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this filter is currently configured on. A disabled filter is
    /// dropped from the chain entirely rather than invoked as a no-op.
    fn enabled(&self) -> bool {
        true
    }

    /// Inspect/act on the inbound request.
    async fn before(&self, ctx: &mut RequestContext) -> Result<FilterOutcome>;

    /// Decorate the outbound response. Default: no-op.
    async fn after(&self, _ctx: &RequestContext, _response: &mut Response) {}
}
