//! Revoked token registry
//!
//! Holds tokens that must no longer be honored even though their signature
//! and expiry still check out. Entries are keyed by the SHA-256 digest of the
//! token string and carry the instant after which they can be forgotten, so
//! the set stays bounded by the number of live tokens.
//!
//! Whole-subject revocation works through epochs: every token carries the
//! subject's epoch at issue time, and bumping the epoch invalidates all
//! tokens issued before the bump.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// token digest -> unix seconds after which the entry is dead weight
    tokens: HashMap<String, i64>,
    /// subject id -> current epoch
    epochs: HashMap<i64, u64>,
}

/// Lock-guarded revocation set, owned by the session manager
#[derive(Default)]
pub struct RevocationRegistry {
    inner: RwLock<Inner>,
}

impl RevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn digest(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Revoke `token` until `expires_at`. Revoking twice keeps the later expiry.
    pub async fn revoke(&self, token: &str, expires_at: i64) {
        let mut inner = self.inner.write().await;
        inner
            .tokens
            .entry(Self::digest(token))
            .and_modify(|exp| *exp = (*exp).max(expires_at))
            .or_insert(expires_at);
    }

    /// Revoke `token` unless it is already revoked.
    /// Returns `true` when this call did the revoking.
    pub async fn revoke_if_absent(&self, token: &str, expires_at: i64) -> bool {
        let mut inner = self.inner.write().await;
        let digest = Self::digest(token);
        if inner.tokens.contains_key(&digest) {
            return false;
        }
        inner.tokens.insert(digest, expires_at);
        true
    }

    pub async fn is_revoked(&self, token: &str) -> bool {
        self.inner.read().await.tokens.contains_key(&Self::digest(token))
    }

    /// Epoch to embed in tokens issued to `subject` right now
    pub async fn subject_epoch(&self, subject: i64) -> u64 {
        self.inner
            .read()
            .await
            .epochs
            .get(&subject)
            .copied()
            .unwrap_or_default()
    }

    /// Invalidate every token issued to `subject` so far
    pub async fn bump_subject(&self, subject: i64) -> u64 {
        let mut inner = self.inner.write().await;
        let epoch = inner.epochs.entry(subject).or_default();
        *epoch += 1;
        *epoch
    }

    pub async fn is_subject_revoked(&self, subject: i64, epoch: u64) -> bool {
        epoch < self.subject_epoch(subject).await
    }

    /// Drop token entries whose token has expired on its own
    pub async fn purge_expired(&self, now: i64) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.tokens.len();
        inner.tokens.retain(|_, expires_at| *expires_at >= now);
        before - inner.tokens.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.tokens.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
