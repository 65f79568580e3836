//! Revocation hook.
//!
//! The engine never stores revocations itself. It asks a [`Blacklist`]
//! collaborator whether a `jti` is revoked and tells it when one should be.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, instrument};

use tessera_core::{Clock, SystemClock, unix_secs};

use crate::claims::EXP;
use crate::error::{AuthError, Result};
use crate::jwt::JwtManager;
use crate::token::TokenKind;

/// Failure talking to a revocation or credential store.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Revocation store keyed by token id.
pub trait Blacklist: Send + Sync {
    fn is_blacklisted(&self, jti: &str) -> std::result::Result<bool, StorageError>;

    /// Record `jti` as revoked. `expires_at` is the token's own `exp`, after
    /// which the entry is no longer needed.
    ///
    /// Returns `false` when the id was already recorded, so callers can use
    /// the store as a single-use guard.
    fn blacklist(&self, jti: &str, expires_at: i64) -> std::result::Result<bool, StorageError>;
}

/// Process-local blacklist. Entries do not survive a restart.
///
/// Entries whose token has expired are dropped on every insert.
pub struct InMemoryBlacklist {
    entries: RwLock<HashMap<String, i64>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryBlacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlacklist")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryBlacklist {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBlacklist {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Blacklist that judges expiry with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose token would already fail the `exp` check at `now`.
    pub fn purge_expired(&self, now: i64) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }
}

impl Blacklist for InMemoryBlacklist {
    fn is_blacklisted(&self, jti: &str) -> std::result::Result<bool, StorageError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(jti))
    }

    fn blacklist(&self, jti: &str, expires_at: i64) -> std::result::Result<bool, StorageError> {
        let now = unix_secs(self.clock.now());
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, exp| *exp > now);
        Ok(entries.insert(jti.to_string(), expires_at).is_none())
    }
}

impl JwtManager {
    /// Revoke a refresh or sliding token so it can no longer be used.
    ///
    /// The token must itself pass verification first.
    #[instrument(skip_all)]
    pub fn revoke(&self, token: &str) -> Result<()> {
        let blacklist = self.blacklist().ok_or_else(|| {
            AuthError::StorageUnavailable("no blacklist store configured".into())
        })?;

        let verified = self.verify_one_of(token, &[TokenKind::Refresh, TokenKind::Sliding])?;
        let jti = verified
            .jti()
            .ok_or_else(|| AuthError::ClaimMissing(self.claim_names().jti.clone()))?;
        let exp = verified
            .exp()
            .ok_or_else(|| AuthError::ClaimMissing(EXP.to_string()))?;

        let newly = blacklist
            .blacklist(jti, exp)
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;

        info!(jti, token_kind = %verified.kind(), newly, "Token revoked");
        Ok(())
    }
}
