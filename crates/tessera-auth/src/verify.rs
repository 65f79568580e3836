//! Verification pipeline for tokens arriving from outside.
//!
//! Stages run in a fixed order and stop at the first failure:
//! 1. structure and signature (codec)
//! 2. mandatory claims
//! 3. `exp`
//! 4. token type
//! 5. blacklist lookup by `jti`, when enabled

use tracing::{debug, instrument};

use crate::claims::ClaimSet;
use crate::error::{AuthError, Result};
use crate::jwt::JwtManager;
use crate::token::{Token, TokenKind, VerifiedToken, base_mandatory_claims, describe_tag};

impl JwtManager {
    /// Check structure and signature only. The result is untrusted until
    /// [`Token::verify`] succeeds on it.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Token> {
        let claims = self.codec().decode(token)?;
        Ok(Token::decoded(self, kind, claims))
    }

    /// Run the full pipeline expecting a token of `kind`.
    #[instrument(skip_all, fields(kind = %kind))]
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<VerifiedToken> {
        let result = self.decode(token, kind).and_then(|decoded| {
            decoded.verify()?;
            Ok(VerifiedToken::new(decoded))
        });
        log_outcome(token, &result);
        result
    }

    /// Run the full pipeline accepting any of `kinds`, chosen by the token's
    /// own type claim.
    #[instrument(skip_all)]
    pub fn verify_one_of(&self, token: &str, kinds: &[TokenKind]) -> Result<VerifiedToken> {
        let result = self.codec().decode(token).and_then(|claims| {
            let decoded = self.select_kind(claims, kinds)?;
            decoded.verify()?;
            Ok(VerifiedToken::new(decoded))
        });
        log_outcome(token, &result);
        result
    }

    /// Run the full pipeline for a token of any known kind.
    pub fn verify_any(&self, token: &str) -> Result<VerifiedToken> {
        self.verify_one_of(token, &TokenKind::ALL)
    }

    fn select_kind(&self, claims: ClaimSet, kinds: &[TokenKind]) -> Result<Token> {
        let names = self.claim_names();
        let matched = claims
            .get_str(&names.token_type)
            .and_then(|tag| kinds.iter().copied().find(|kind| kind.type_tag() == tag));

        let fallback = kinds.first().copied().unwrap_or(TokenKind::Access);
        let token = Token::decoded(self, matched.unwrap_or(fallback), claims);
        if matched.is_some() {
            return Ok(token);
        }

        // Same stage order as `Token::verify`, up to the type check.
        let required = match kinds {
            [only] => only.mandatory_claims(names),
            _ => base_mandatory_claims(names).to_vec(),
        };
        token.check_present(&required)?;
        token.check_exp()?;
        Err(AuthError::TokenTypeMismatch {
            expected: kinds
                .iter()
                .map(|kind| kind.type_tag())
                .collect::<Vec<_>>()
                .join("|"),
            actual: describe_tag(token.get(&names.token_type)),
        })
    }
}

fn log_outcome(token: &str, result: &Result<VerifiedToken>) {
    match result {
        Ok(verified) => debug!(
            jti = verified.jti().unwrap_or_default(),
            token_kind = %verified.kind(),
            "Token verified"
        ),
        Err(e) => debug!(
            fingerprint = %JwtManager::fingerprint(token),
            error_kind = %e.kind(),
            error = %e,
            "Token rejected"
        ),
    }
}
