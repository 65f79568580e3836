//! Resource-access check for `Authorization` header values.

use tracing::debug;

use crate::error::{AuthError, Result};
use crate::jwt::JwtManager;
use crate::token::VerifiedToken;

/// Pull the raw token out of a header value such as `Bearer <token>`.
///
/// The value must be exactly two whitespace-separated parts and the first
/// must be one of `header_types`. Matching is case-sensitive.
pub fn extract_bearer<'a, S: AsRef<str>>(header: &'a str, header_types: &[S]) -> Option<&'a str> {
    let mut parts = header.split_whitespace();
    let (scheme, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    header_types
        .iter()
        .any(|t| t.as_ref() == scheme)
        .then_some(token)
}

impl JwtManager {
    /// Authenticate a request from its `Authorization` header value.
    ///
    /// Any token kind listed in `auth_token_kinds` is accepted.
    pub fn authenticate_header(&self, header: Option<&str>) -> Result<VerifiedToken> {
        let token = header
            .and_then(|h| extract_bearer(h, &self.policy().auth_header_types))
            .ok_or_else(|| {
                debug!("Missing or unusable authorization header");
                AuthError::MissingCredentials
            })?;
        self.verify_one_of(token, self.auth_kinds())
    }
}
