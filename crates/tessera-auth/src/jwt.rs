//! Process-wide token engine: key material, lifetimes, policy, clock and
//! the optional blacklist, shared by every token it mints or decodes.

use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use tessera_core::config::{LifetimeConfig, PolicyConfig};
use tessera_core::{Clock, Config, SystemClock};

use crate::blacklist::Blacklist;
use crate::claims::ClaimNames;
use crate::codec::TokenCodec;
use crate::error::{AuthError, Result};
use crate::token::{Token, TokenKind};

/// Manages token creation and validation.
///
/// Cheap to clone; all state is immutable and shared.
#[derive(Clone)]
pub struct JwtManager {
    inner: Arc<Inner>,
}

struct Inner {
    codec: TokenCodec,
    names: ClaimNames,
    lifetimes: LifetimeConfig,
    policy: PolicyConfig,
    auth_kinds: Vec<TokenKind>,
    clock: Arc<dyn Clock>,
    blacklist: Option<Arc<dyn Blacklist>>,
}

impl JwtManager {
    /// Start building a manager. The configuration is validated first.
    pub fn builder(config: &Config) -> tessera_core::Result<JwtManagerBuilder> {
        config.validate()?;
        Ok(JwtManagerBuilder {
            codec: TokenCodec::from_config(&config.signing)?,
            names: ClaimNames::from_config(&config.claims),
            lifetimes: config.lifetimes.clone(),
            policy: config.policy.clone(),
            clock: Arc::new(SystemClock),
            blacklist: None,
        })
    }

    /// Mint a fresh, unsigned token of the given kind.
    pub fn issue(&self, kind: TokenKind) -> Token {
        Token::fresh(self, kind)
    }

    /// Mint a fresh token carrying the principal id in the user-id claim.
    pub fn issue_for(&self, kind: TokenKind, principal_id: impl Into<Value>) -> Token {
        let mut token = Token::fresh(self, kind);
        token.set(self.inner.names.user_id.clone(), principal_id);
        token
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.inner.codec
    }

    pub fn claim_names(&self) -> &ClaimNames {
        &self.inner.names
    }

    pub fn lifetimes(&self) -> &LifetimeConfig {
        &self.inner.lifetimes
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.inner.policy
    }

    /// Token kinds accepted for resource access.
    pub fn auth_kinds(&self) -> &[TokenKind] {
        &self.inner.auth_kinds
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    pub fn blacklist(&self) -> Option<&dyn Blacklist> {
        self.inner.blacklist.as_deref()
    }

    /// Final pipeline stage: reject blacklisted ids when checking is enabled.
    ///
    /// Storage failures reject the token unless `blacklist_fail_open` is set.
    pub(crate) fn check_blacklist(&self, jti: &str) -> Result<()> {
        if !self.inner.policy.blacklist_enabled {
            return Ok(());
        }
        let Some(blacklist) = self.blacklist() else {
            return Ok(());
        };

        match blacklist.is_blacklisted(jti) {
            Ok(false) => Ok(()),
            Ok(true) => {
                debug!(jti, "Rejected blacklisted token");
                Err(AuthError::Blacklisted)
            }
            Err(e) if self.inner.policy.blacklist_fail_open => {
                warn!(jti, error = %e, "Blacklist unavailable, accepting token (fail-open)");
                Ok(())
            }
            Err(e) => {
                warn!(jti, error = %e, "Blacklist unavailable, rejecting token");
                Err(AuthError::StorageUnavailable(e.to_string()))
            }
        }
    }

    /// Short stable digest of a wire token, safe to put in logs.
    pub fn fingerprint(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }
}

/// Builder for [`JwtManager`]; injects the clock and blacklist.
pub struct JwtManagerBuilder {
    codec: TokenCodec,
    names: ClaimNames,
    lifetimes: LifetimeConfig,
    policy: PolicyConfig,
    clock: Arc<dyn Clock>,
    blacklist: Option<Arc<dyn Blacklist>>,
}

impl JwtManagerBuilder {
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn blacklist(mut self, blacklist: Arc<dyn Blacklist>) -> Self {
        self.blacklist = Some(blacklist);
        self
    }

    /// Replace the codec built from the signing configuration.
    #[must_use]
    pub fn codec(mut self, codec: TokenCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn build(self) -> tessera_core::Result<JwtManager> {
        if self.policy.blacklist_enabled && self.blacklist.is_none() {
            return Err(tessera_core::Error::Config(
                "blacklist_enabled requires a blacklist store".into(),
            ));
        }

        let auth_kinds = self
            .policy
            .auth_token_kinds
            .iter()
            .map(|name| {
                name.parse::<TokenKind>().map_err(|_| {
                    tessera_core::Error::Config(format!("Unknown token kind: {name}"))
                })
            })
            .collect::<tessera_core::Result<Vec<_>>>()?;

        Ok(JwtManager {
            inner: Arc::new(Inner {
                codec: self.codec,
                names: self.names,
                lifetimes: self.lifetimes,
                policy: self.policy,
                auth_kinds,
                clock: self.clock,
                blacklist: self.blacklist,
            }),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::blacklist::{InMemoryBlacklist, StorageError};
    use crate::error::ErrorKind;
    use tessera_core::FixedClock;

    struct BrokenBlacklist;

    impl Blacklist for BrokenBlacklist {
        fn is_blacklisted(&self, _jti: &str) -> std::result::Result<bool, StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }

        fn blacklist(
            &self,
            _jti: &str,
            _expires_at: i64,
        ) -> std::result::Result<bool, StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
    }

    fn config_with_blacklist(fail_open: bool) -> Config {
        let mut config = Config::default();
        config.policy.blacklist_enabled = true;
        config.policy.blacklist_fail_open = fail_open;
        config
    }

    #[test]
    fn issue_for_sets_user_id_claim() {
        let jwt = JwtManager::builder(&Config::default())
            .unwrap()
            .build()
            .unwrap();
        let token = jwt.issue_for(TokenKind::Refresh, "user-1");
        assert_eq!(token.claims().get_str("user_id"), Some("user-1"));
        assert_eq!(token.token_type(), Some("refresh"));
    }

    #[test]
    fn builder_rejects_invalid_configuration() {
        let mut config = Config::default();
        config.lifetimes.access_token_secs = -5;
        assert!(JwtManager::builder(&config).is_err());

        let mut config = Config::default();
        config.claims.jti = "exp".into();
        assert!(JwtManager::builder(&config).is_err());
    }

    #[test]
    fn blacklist_enabled_without_store_is_rejected() {
        let result = JwtManager::builder(&config_with_blacklist(false))
            .unwrap()
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn blacklisted_jti_is_rejected() {
        let blacklist = Arc::new(InMemoryBlacklist::new());
        let jwt = JwtManager::builder(&config_with_blacklist(false))
            .unwrap()
            .clock(Arc::new(FixedClock::at_unix(1_000)))
            .blacklist(Arc::clone(&blacklist) as Arc<dyn Blacklist>)
            .build()
            .unwrap();

        let token = jwt.issue(TokenKind::Access);
        token.verify().unwrap();

        blacklist
            .blacklist(token.jti().unwrap(), token.exp().unwrap())
            .unwrap();
        assert_eq!(token.verify().unwrap_err(), AuthError::Blacklisted);
    }

    #[test]
    fn blacklist_outage_fails_closed_by_default() {
        let jwt = JwtManager::builder(&config_with_blacklist(false))
            .unwrap()
            .blacklist(Arc::new(BrokenBlacklist))
            .build()
            .unwrap();
        let err = jwt.issue(TokenKind::Access).verify().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[test]
    fn blacklist_outage_can_fail_open() {
        let jwt = JwtManager::builder(&config_with_blacklist(true))
            .unwrap()
            .blacklist(Arc::new(BrokenBlacklist))
            .build()
            .unwrap();
        jwt.issue(TokenKind::Access).verify().unwrap();
    }

    #[test]
    fn blacklist_not_consulted_when_disabled() {
        let jwt = JwtManager::builder(&Config::default())
            .unwrap()
            .blacklist(Arc::new(BrokenBlacklist))
            .build()
            .unwrap();
        jwt.issue(TokenKind::Access).verify().unwrap();
    }

    #[test]
    fn fingerprint_is_deterministic_and_short() {
        let a = JwtManager::fingerprint("same-token");
        assert_eq!(a, JwtManager::fingerprint("same-token"));
        assert_ne!(a, JwtManager::fingerprint("different-token"));
        assert_eq!(a.len(), 16);
    }
}
