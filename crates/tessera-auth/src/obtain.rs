//! Obtain flow: trade credentials for a fresh set of tokens.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::credentials::{AuthFailure, CredentialStore, Principal};
use crate::error::{AuthError, Result};
use crate::jwt::JwtManager;
use crate::token::TokenKind;

/// Which token family a client asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFamily {
    /// Access plus refresh.
    Pair,
    Sliding,
}

/// Tokens handed out by a successful obtain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObtainedTokens {
    Pair { access: String, refresh: String },
    Sliding { token: String },
}

/// Authenticates principals and mints their first tokens.
#[derive(Clone)]
pub struct AuthService {
    jwt: JwtManager,
    store: Arc<dyn CredentialStore>,
}

impl AuthService {
    pub fn new(jwt: JwtManager, store: Arc<dyn CredentialStore>) -> Self {
        Self { jwt, store }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    #[instrument(skip(self, secret), fields(family = ?family))]
    pub fn obtain(
        &self,
        login_id: &str,
        secret: &str,
        family: TokenFamily,
    ) -> Result<ObtainedTokens> {
        let principal = self.authenticate(login_id, secret)?;

        let tokens = match family {
            TokenFamily::Pair => {
                let refresh = self.jwt.issue_for(TokenKind::Refresh, principal.id.clone());
                let access = refresh.access_token()?;
                ObtainedTokens::Pair {
                    access: access.render()?,
                    refresh: refresh.render()?,
                }
            }
            TokenFamily::Sliding => ObtainedTokens::Sliding {
                token: self
                    .jwt
                    .issue_for(TokenKind::Sliding, principal.id.clone())
                    .render()?,
            },
        };

        info!(user_id = %principal.id, login = %principal.login, "Principal obtained tokens");
        Ok(tokens)
    }

    pub fn obtain_pair(&self, login_id: &str, secret: &str) -> Result<ObtainedTokens> {
        self.obtain(login_id, secret, TokenFamily::Pair)
    }

    pub fn obtain_sliding(&self, login_id: &str, secret: &str) -> Result<ObtainedTokens> {
        self.obtain(login_id, secret, TokenFamily::Sliding)
    }

    fn authenticate(&self, login_id: &str, secret: &str) -> Result<Principal> {
        let principal = self.store.authenticate(login_id, secret).map_err(|e| {
            match &e {
                AuthFailure::Unavailable(reason) => {
                    warn!(login = %login_id, reason = %reason, "Credential store unavailable");
                }
                _ => warn!(login = %login_id, error = %e, "Failed login attempt"),
            }
            match e {
                AuthFailure::InvalidCredentials => AuthError::AuthenticationFailed,
                AuthFailure::Inactive => AuthError::AccountInactive,
                AuthFailure::Unavailable(reason) => AuthError::StorageUnavailable(reason),
            }
        })?;

        if !principal.active {
            warn!(login = %login_id, "Failed login attempt on inactive account");
            return Err(AuthError::AccountInactive);
        }
        Ok(principal)
    }
}
