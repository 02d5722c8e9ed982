//! Per-key rate limiting filter.
//!
//! A single shared `governor::RateLimiter` behind a mutex gives one bucket
//! for the whole process, which does not generalize to a multi-tenant
//! middleware core where each client/IP/API key must be throttled
//! independently: this filter keys a separate limiter per identity in a
//! `DashMap`, with an idle-eviction sweep so the map does not grow
//! unbounded across a long-lived process.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovernorLimiter};

use super::{Filter, FilterOutcome};
use crate::config::RateLimitConfig;
use crate::error::{Error, Result};
use crate::request::RequestContext;

type DirectLimiter = GovernorLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

struct Entry {
    limiter: Arc<DirectLimiter>,
    last_used_secs: AtomicU64,
}

/// Throttles requests per rate-limit key (by default, the client IP — a
/// caller fronting this core with authenticated sessions should key by
/// subject ID instead by calling [`RateLimitFilter::key_for`] accordingly).
pub struct RateLimitFilter {
    config: RateLimitConfig,
    buckets: DashMap<String, Entry>,
}

impl RateLimitFilter {
    /// Build a filter from configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// The rate-limit key for `ctx`: the authenticated subject ID if known,
    /// else the client IP, else a shared fallback key.
    #[must_use]
    pub fn key_for(ctx: &RequestContext) -> String {
        if let Some(principal) = ctx.principal() {
            return format!("subject:{}", principal.subject_id);
        }
        match ctx.request.client_ip() {
            Some(ip) => format!("ip:{ip}"),
            None => "anonymous".to_string(),
        }
    }

    fn quota(&self) -> Quota {
        let rate = NonZeroU32::new(self.config.requests_per_window).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.config.burst.max(self.config.requests_per_window)).unwrap_or(rate);
        Quota::with_period(self.config.window / rate.get().max(1))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst)
    }

    /// Check whether `key` may proceed right now, minting a fresh
    /// per-key limiter on first use.
    pub fn check(&self, key: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let now = now_secs();
        if let Some(entry) = self.buckets.get(key) {
            entry.last_used_secs.store(now, Ordering::Relaxed);
            return entry.limiter.check().is_ok();
        }

        let limiter = Arc::new(GovernorLimiter::direct(self.quota()));
        let allowed = limiter.check().is_ok();
        self.buckets.insert(
            key.to_string(),
            Entry {
                limiter,
                last_used_secs: AtomicU64::new(now),
            },
        );
        allowed
    }

    /// Evict buckets untouched for longer than `idle_for`.
    pub fn sweep_idle(&self, idle_for: Duration) -> usize {
        let now = now_secs();
        let idle_secs = idle_for.as_secs();
        let stale: Vec<String> = self
            .buckets
            .iter()
            .filter(|e| now.saturating_sub(e.value().last_used_secs.load(Ordering::Relaxed)) > idle_secs)
            .map(|e| e.key().clone())
            .collect();
        let count = stale.len();
        for key in stale {
            self.buckets.remove(&key);
        }
        count
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[async_trait]
impl Filter for RateLimitFilter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn before(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        if !self.config.enabled {
            return Ok(FilterOutcome::Continue);
        }
        let key = Self::key_for(ctx);
        if self.check(&key) {
            Ok(FilterOutcome::Continue)
        } else {
            Err(Error::RateLimited {
                retry_after_secs: self.config.window.as_secs(),
            })
        }
    }
}

/// Spawn a background task that periodically evicts idle per-key limiter
/// state, exiting when `shutdown` fires.
pub fn spawn_sweeper(
    filter: Arc<RateLimitFilter>,
    shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let interval = filter.config.sweep_interval;
    let mut shutdown = shutdown;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    filter.sweep_idle(interval * 3);
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}
