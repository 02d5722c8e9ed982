//! Circuit breaker state machine and per-scope registry.
//!
//! A `Closed`/`Open`/`HalfOpen` state machine with atomics for counters and
//! epoch-millisecond timestamps for reset-timeout arithmetic, held in a
//! [`BreakerRegistry`] keyed by an arbitrary scope string — this core
//! protects operations identified by the caller rather than a fixed set of
//! backends.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;
use crate::error::{Error, Result};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests proceed normally.
    Closed,
    /// Requests are rejected outright.
    Open,
    /// A limited number of probe requests are admitted to test recovery.
    HalfOpen,
}

impl CircuitState {
    /// Lowercase kebab-case label for audit output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

fn epoch_millis_now() -> u64 {
    #[allow(clippy::cast_possible_truncation)]
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A single named breaker scope's state machine.
pub struct CircuitBreaker {
    scope: String,
    config: BreakerConfig,
    state: RwLock<CircuitState>,
    failures: AtomicU32,
    successes: AtomicU32,
    half_open_inflight: AtomicU32,
    last_state_change_ms: AtomicU64,
    trips_count: AtomicU64,
}

impl CircuitBreaker {
    /// Build a breaker for `scope` with the given configuration.
    #[must_use]
    pub fn new(scope: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            scope: scope.into(),
            config,
            state: RwLock::new(CircuitState::Closed),
            failures: AtomicU32::new(0),
            successes: AtomicU32::new(0),
            half_open_inflight: AtomicU32::new(0),
            last_state_change_ms: AtomicU64::new(0),
            trips_count: AtomicU64::new(0),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        *self.state.read()
    }

    /// Milliseconds remaining until a half-open probe is admitted (0 if not
    /// `Open` or the reset timeout already elapsed).
    #[must_use]
    pub fn retry_after_ms(&self) -> u64 {
        if *self.state.read() != CircuitState::Open {
            return 0;
        }
        let elapsed = epoch_millis_now().saturating_sub(self.last_state_change_ms.load(Ordering::Relaxed));
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = self.config.reset_timeout.as_millis() as u64;
        timeout_ms.saturating_sub(elapsed)
    }

    /// Whether a call may proceed right now, transitioning `Open` ->
    /// `HalfOpen` once the reset timeout has elapsed.
    fn admit(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        let state = *self.state.read();
        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.retry_after_ms() == 0 {
                    self.transition_to(CircuitState::HalfOpen);
                    self.half_open_inflight.fetch_add(1, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                let inflight = self.half_open_inflight.fetch_add(1, Ordering::Relaxed);
                if inflight < self.config.half_open_max_calls {
                    true
                } else {
                    self.half_open_inflight.fetch_sub(1, Ordering::Relaxed);
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        if !self.config.enabled {
            return;
        }
        match *self.state.read() {
            CircuitState::Closed => self.failures.store(0, Ordering::Relaxed),
            CircuitState::HalfOpen => {
                self.half_open_inflight.fetch_sub(1, Ordering::Relaxed);
                let successes = self.successes.fetch_add(1, Ordering::Relaxed) + 1;
                if successes >= self.config.success_threshold {
                    self.transition_to(CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }
        match *self.state.read() {
            CircuitState::Closed => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.config.max_failures {
                    self.transition_to(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                self.half_open_inflight.fetch_sub(1, Ordering::Relaxed);
                self.transition_to(CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn transition_to(&self, new_state: CircuitState) {
        let mut state = self.state.write();
        if *state == new_state {
            return;
        }
        *state = new_state;
        self.last_state_change_ms.store(epoch_millis_now(), Ordering::Relaxed);

        match new_state {
            CircuitState::Closed => {
                self.failures.store(0, Ordering::Relaxed);
                self.successes.store(0, Ordering::Relaxed);
                info!(scope = %self.scope, "circuit breaker closed");
            }
            CircuitState::Open => {
                self.trips_count.fetch_add(1, Ordering::Relaxed);
                warn!(scope = %self.scope, "circuit breaker opened");
            }
            CircuitState::HalfOpen => {
                self.successes.store(0, Ordering::Relaxed);
                debug!(scope = %self.scope, "circuit breaker half-open");
            }
        }
    }
}

/// Registry of breakers keyed by scope name, built once from
/// [`crate::config::Config::breaker`] and shared across requests.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: BreakerConfig,
}

impl BreakerRegistry {
    /// Build a registry pre-populated with one breaker per configured scope.
    /// Scopes not present in `configs` fall back to `default_config` the
    /// first time they're used.
    #[must_use]
    pub fn new(configs: HashMap<String, BreakerConfig>, default_config: BreakerConfig) -> Self {
        let breakers = DashMap::new();
        for (scope, config) in configs {
            breakers.insert(scope.clone(), Arc::new(CircuitBreaker::new(scope, config)));
        }
        Self { breakers, default_config }
    }

    fn get_or_insert(&self, scope: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(scope) {
            return existing.clone();
        }
        let breaker = Arc::new(CircuitBreaker::new(scope, self.default_config.clone()));
        self.breakers.insert(scope.to_string(), breaker.clone());
        breaker
    }

    /// Current state for `scope` (builds a default-config breaker if unseen).
    #[must_use]
    pub fn state(&self, scope: &str) -> CircuitState {
        self.get_or_insert(scope).state()
    }

    /// Run `operation` through the named breaker: rejects immediately if the
    /// circuit is open, applies the configured operation timeout, and
    /// records success/failure based on the operation's own `Result`.
    ///
    /// `operation` is driven on its own `tokio` task so a panic inside it
    /// unwinds that task instead of this one — the breaker observes it via
    /// `JoinError::is_panic` and counts it as a failure like any other.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircuitOpen`] if the breaker rejects the call,
    /// [`Error::Timeout`] if `operation` exceeds `op_timeout`, or
    /// [`Error::Internal`] if `operation` panicked or its task was
    /// cancelled. Otherwise returns whatever `operation` itself returned.
    pub async fn call<F, Fut, T>(&self, scope: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let breaker = self.get_or_insert(scope);

        if !breaker.admit() {
            return Err(Error::CircuitOpen {
                scope: scope.to_string(),
                retry_after_ms: breaker.retry_after_ms(),
            });
        }

        let op_timeout = breaker.config.op_timeout;
        let fut = operation();
        let task = tokio::spawn(async move { tokio::time::timeout(op_timeout, fut).await });

        match task.await {
            Ok(Ok(Ok(value))) => {
                breaker.record_success();
                Ok(value)
            }
            Ok(Ok(Err(err))) => {
                breaker.record_failure();
                Err(err)
            }
            Ok(Err(_elapsed)) => {
                breaker.record_failure();
                Err(Error::Timeout)
            }
            Err(join_err) => {
                breaker.record_failure();
                if join_err.is_panic() {
                    warn!(scope = %scope, "operation panicked inside circuit breaker");
                    Err(Error::Internal(format!("operation panicked in breaker scope '{scope}'")))
                } else {
                    Err(Error::Internal(format!("operation cancelled in breaker scope '{scope}'")))
                }
            }
        }
    }
}
