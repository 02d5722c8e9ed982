//! Server-issued bearer tokens and the token store.
//!
//! A single `DashMap` keyed by bearer value gives O(1) lookup and
//! revocation; a background reaper, spawned with a shutdown broadcast
//! receiver, sweeps expired entries on an interval.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto;

/// The three token types this crate mints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token.
    Access,
    /// Long-lived token used solely to mint new access tokens.
    Refresh,
    /// Identity token carrying profile claims (OIDC-style `id_token`).
    Id,
}

/// A server-issued bearer value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Opaque, cryptographically random, URL-safe string.
    pub value: String,
    /// Token type.
    pub token_type: TokenType,
    /// Subject ID this token authenticates.
    pub subject_id: String,
    /// Issued-at (Unix seconds).
    pub issued_at: u64,
    /// Expires-at (Unix seconds). Always `> issued_at`.
    pub expires_at: u64,
    /// Scopes granted to this token.
    pub scopes: Vec<String>,
    /// The refresh token this access token was minted alongside, if any.
    pub linked_refresh_token: Option<String>,
    /// Free-form metadata.
    pub metadata: BTreeMap<String, String>,
}

impl Token {
    /// `true` if `now` is at or past this token's expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// `true` if currently expired (uses the wall clock).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Mint a fresh token with at-least-128-bit entropy, URL-safe encoded
///.
#[must_use]
pub fn mint_token(
    token_type: TokenType,
    subject_id: impl Into<String>,
    ttl: Duration,
    scopes: Vec<String>,
    linked_refresh_token: Option<String>,
) -> Token {
    let now = now_secs();
    Token {
        value: crypto::random_token(32),
        token_type,
        subject_id: subject_id.into(),
        issued_at: now,
        expires_at: now + ttl.as_secs().max(1),
        scopes,
        linked_refresh_token,
        metadata: BTreeMap::new(),
    }
}

/// Storage contract for issued tokens.
///
/// Implementations must be safe for concurrent readers and writers. A `get`
/// returning an unexpired entry guarantees the entry was not revoked at the
/// instant of the call; `revoke` followed by any subsequent `get` for the
/// same token string must return `None` (linearizable).
#[async_trait]
pub trait TokenStore: Send + Sync + 'static {
    /// Insert a newly minted token. At-most-once: a token string already
    /// present is overwritten (callers must not mint duplicate values —
    /// astronomically unlikely given 256-bit entropy).
    async fn put(&self, token: Token);

    /// Look up a token by its bearer value.
    async fn get(&self, value: &str) -> Option<Token>;

    /// Revoke a token by its bearer value. Returns `true` if it existed.
    async fn revoke(&self, value: &str) -> bool;

    /// Revoke every active token for a subject (offboarding). Returns the
    /// count removed.
    async fn revoke_by_subject(&self, subject_id: &str) -> usize;

    /// Remove all expired entries. Called periodically by the background
    /// reaper; must not block concurrent `get`/`put` beyond brief critical
    /// sections.
    async fn sweep(&self) -> usize;
}

/// In-memory token store backed by a `DashMap`, keyed by bearer value, with
/// a secondary index for per-subject revocation.
pub struct InMemoryTokenStore {
    by_value: DashMap<String, Token>,
}

impl InMemoryTokenStore {
    /// Build an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_value: DashMap::new(),
        }
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn put(&self, token: Token) {
        self.by_value.insert(token.value.clone(), token);
    }

    async fn get(&self, value: &str) -> Option<Token> {
        let entry = self.by_value.get(value)?;
        let token = entry.clone();
        drop(entry);

        if token.is_expired() {
            self.by_value.remove(value);
            debug!(subject = %token.subject_id, "lazily evicted expired token");
            return None;
        }
        Some(token)
    }

    async fn revoke(&self, value: &str) -> bool {
        self.by_value.remove(value).is_some()
    }

    async fn revoke_by_subject(&self, subject_id: &str) -> usize {
        let values: Vec<String> = self
            .by_value
            .iter()
            .filter(|e| e.value().subject_id == subject_id)
            .map(|e| e.key().clone())
            .collect();
        let count = values.len();
        for value in values {
            self.by_value.remove(&value);
        }
        count
    }

    async fn sweep(&self) -> usize {
        let now = now_secs();
        let expired: Vec<String> = self
            .by_value
            .iter()
            .filter(|e| e.value().is_expired_at(now))
            .map(|e| e.key().clone())
            .collect();
        let count = expired.len();
        for value in expired {
            self.by_value.remove(&value);
        }
        count
    }
}

/// Spawn a background task that sweeps expired tokens every `interval`,
/// exiting when `shutdown` fires.
pub fn spawn_sweeper(
    store: Arc<dyn TokenStore>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let swept = store.sweep().await;
                    if swept > 0 {
                        debug!(count = swept, "swept expired tokens");
                    }
                }
                _ = shutdown.recv() => {
                    debug!("token sweeper shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_exp_offset(subject: &str, offset_secs: i64) -> Token {
        let now = now_secs();
        let expires_at = if offset_secs >= 0 {
            now + offset_secs as u64
        } else {
            now.saturating_sub((-offset_secs) as u64)
        };
        Token {
            value: crypto::random_token(32),
            token_type: TokenType::Access,
            subject_id: subject.to_string(),
            issued_at: now,
            expires_at,
            scopes: vec!["read".to_string()],
            linked_refresh_token: None,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_token() {
        let store = InMemoryTokenStore::new();
        let token = token_with_exp_offset("alice", 3600);
        let value = token.value.clone();
        store.put(token).await;
        assert!(store.get(&value).await.is_some());
    }

    #[tokio::test]
    async fn get_unknown_returns_none() {
        let store = InMemoryTokenStore::new();
        assert!(store.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn revoked_token_never_revalidates() {
        let store = InMemoryTokenStore::new();
        let token = token_with_exp_offset("alice", 3600);
        let value = token.value.clone();
        store.put(token).await;

        assert!(store.revoke(&value).await);
        assert!(store.get(&value).await.is_none());
        // Idempotent: revoking again returns false, still absent.
        assert!(!store.revoke(&value).await);
        assert!(store.get(&value).await.is_none());
    }

    #[tokio::test]
    async fn expired_token_lazily_evicted_on_get() {
        let store = InMemoryTokenStore::new();
        let token = token_with_exp_offset("alice", -1);
        let value = token.value.clone();
        store.put(token).await;
        assert!(store.get(&value).await.is_none());
    }

    #[tokio::test]
    async fn revoke_by_subject_removes_only_that_subjects_tokens() {
        let store = InMemoryTokenStore::new();
        let t1 = token_with_exp_offset("alice", 3600);
        let t2 = token_with_exp_offset("alice", 3600);
        let t3 = token_with_exp_offset("bob", 3600);
        let bob_value = t3.value.clone();
        store.put(t1).await;
        store.put(t2).await;
        store.put(t3).await;

        let removed = store.revoke_by_subject("alice").await;
        assert_eq!(removed, 2);
        assert!(store.get(&bob_value).await.is_some());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let store = InMemoryTokenStore::new();
        let valid = token_with_exp_offset("alice", 3600);
        let expired = token_with_exp_offset("bob", -5);
        let valid_value = valid.value.clone();
        store.put(valid).await;
        store.put(expired).await;

        let swept = store.sweep().await;
        assert_eq!(swept, 1);
        assert!(store.get(&valid_value).await.is_some());
    }

    #[test]
    fn mint_token_sets_expiry_after_issued_at() {
        let token = mint_token(TokenType::Access, "alice", Duration::from_secs(900), vec![], None);
        assert!(token.expires_at > token.issued_at);
    }

    #[tokio::test]
    async fn generate_then_validate_round_trip() {
        let store = InMemoryTokenStore::new();
        let token = mint_token(
            TokenType::Access,
            "alice",
            Duration::from_secs(60),
            vec!["events:read".to_string()],
            None,
        );
        let value = token.value.clone();
        store.put(token.clone()).await;

        let fetched = store.get(&value).await.unwrap();
        assert_eq!(fetched.subject_id, token.subject_id);
        assert_eq!(fetched.scopes, token.scopes);
    }
}
