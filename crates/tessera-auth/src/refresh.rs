//! Refresh strategies: pair rotation and sliding extension.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::claims::EXP;
use crate::error::{AuthError, Result};
use crate::jwt::JwtManager;
use crate::token::TokenKind;

/// Result of a pair refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedPair {
    pub access: String,
    /// Present only when refresh-token rotation is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// Result of a sliding refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedSliding {
    pub token: String,
}

impl JwtManager {
    /// Exchange a refresh token for a new access token.
    ///
    /// With rotation enabled the refresh token also gets a new `jti` and
    /// `exp` and is returned alongside. When `blacklist_after_rotation` is set
    /// and a store is configured, the consumed id is blacklisted once the new
    /// token has rendered. If another caller consumed it first the refresh
    /// fails with [`AuthError::Blacklisted`].
    #[instrument(skip_all)]
    pub fn refresh_pair(&self, refresh_token: &str) -> Result<RefreshedPair> {
        let verified = self.verify(refresh_token, TokenKind::Refresh)?;
        let access = verified.access_token()?.render()?;

        let policy = self.policy();
        if !policy.rotate_refresh_tokens {
            debug!(jti = verified.jti().unwrap_or_default(), "Access token refreshed");
            return Ok(RefreshedPair {
                access,
                refresh: None,
            });
        }

        let mut refresh = verified.into_token();
        let old_jti = refresh.jti().unwrap_or_default().to_string();
        let old_exp = refresh
            .exp()
            .ok_or_else(|| AuthError::ClaimMissing(EXP.to_string()))?;

        let now = refresh.current_time();
        refresh.set_jti();
        refresh.set_exp();
        refresh.set_iat(now);
        let rotated = refresh.render()?;

        if policy.blacklist_after_rotation {
            if let Some(blacklist) = self.blacklist() {
                let newly = blacklist
                    .blacklist(&old_jti, old_exp)
                    .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;
                if !newly {
                    warn!(jti = %old_jti, "Refresh token already consumed");
                    return Err(AuthError::Blacklisted);
                }
            }
        }

        info!(
            old_jti = %old_jti,
            new_jti = refresh.jti().unwrap_or_default(),
            "Refresh token rotated"
        );

        Ok(RefreshedPair {
            access,
            refresh: Some(rotated),
        })
    }

    /// Push a sliding token's `exp` forward, keeping every other claim.
    ///
    /// The refresh deadline claim is never moved, which bounds how long a
    /// sliding token can be kept alive.
    #[instrument(skip_all)]
    pub fn refresh_sliding(&self, token: &str) -> Result<RefreshedSliding> {
        let verified = self.verify(token, TokenKind::Sliding)?;

        let claim = self.claim_names().refresh_exp.as_str();
        verified
            .check_exp_at(claim, verified.current_time())
            .map_err(|e| match e {
                AuthError::ClaimExpired(claim) => AuthError::RefreshPeriodExpired { claim },
                other => other,
            })?;

        let mut token = verified.into_token();
        token.set_exp();
        let rendered = token.render()?;

        debug!(
            jti = token.jti().unwrap_or_default(),
            exp = token.exp().unwrap_or_default(),
            "Sliding token extended"
        );
        Ok(RefreshedSliding { token: rendered })
    }
}
