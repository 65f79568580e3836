//! Error taxonomy for token issuance, verification and refresh.

use thiserror::Error;

/// Result type alias using [`AuthError`].
pub type Result<T> = std::result::Result<T, AuthError>;

/// Message shown to untrusted callers for any token they cannot use.
pub const INVALID_OR_EXPIRED: &str = "Token is invalid or expired";

/// Message shown for every failed credential exchange.
pub const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";

/// Stable, payload-free classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedToken,
    InvalidSignature,
    ClaimMissing,
    ClaimExpired,
    TokenTypeMismatch,
    RefreshPeriodExpired,
    Blacklisted,
    MissingCredentials,
    AuthenticationFailed,
    AccountInactive,
    StorageUnavailable,
    Encode,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::ClaimMissing => "claim_missing",
            Self::ClaimExpired => "claim_expired",
            Self::TokenTypeMismatch => "token_type_mismatch",
            Self::RefreshPeriodExpired => "refresh_period_expired",
            Self::Blacklisted => "blacklisted",
            Self::MissingCredentials => "missing_credentials",
            Self::AuthenticationFailed => "authentication_failed",
            Self::AccountInactive => "account_inactive",
            Self::StorageUnavailable => "storage_unavailable",
            Self::Encode => "encode",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way a token or credential exchange can fail.
///
/// `Display` carries the internal diagnostic meant for logs. Use
/// [`AuthError::public_message`] for anything returned to a client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token signature rejected: {0}")]
    InvalidSignature(String),

    #[error("Token has no '{0}' claim")]
    ClaimMissing(String),

    #[error("Token '{0}' claim has expired")]
    ClaimExpired(String),

    #[error("Token has wrong type: expected '{expected}', found '{actual}'")]
    TokenTypeMismatch { expected: String, actual: String },

    #[error("Token '{claim}' claim has expired")]
    RefreshPeriodExpired { claim: String },

    #[error("Token is blacklisted")]
    Blacklisted,

    #[error("Authorization header missing or malformed")]
    MissingCredentials,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Token encoding failed: {0}")]
    Encode(String),
}

impl AuthError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedToken(_) => ErrorKind::MalformedToken,
            Self::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Self::ClaimMissing(_) => ErrorKind::ClaimMissing,
            Self::ClaimExpired(_) => ErrorKind::ClaimExpired,
            Self::TokenTypeMismatch { .. } => ErrorKind::TokenTypeMismatch,
            Self::RefreshPeriodExpired { .. } => ErrorKind::RefreshPeriodExpired,
            Self::Blacklisted => ErrorKind::Blacklisted,
            Self::MissingCredentials => ErrorKind::MissingCredentials,
            Self::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            Self::AccountInactive => ErrorKind::AccountInactive,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::Encode(_) => ErrorKind::Encode,
        }
    }

    /// Message safe to return to an untrusted caller.
    ///
    /// Tampering, malformed input and plain expiry of `exp` are
    /// indistinguishable here; the precise kind stays available through
    /// [`AuthError::kind`] for logging.
    pub fn public_message(&self) -> String {
        match self {
            Self::MalformedToken(_) | Self::InvalidSignature(_) => INVALID_OR_EXPIRED.to_string(),
            Self::ClaimExpired(claim) if claim == "exp" => INVALID_OR_EXPIRED.to_string(),
            Self::TokenTypeMismatch { .. } => "Token has wrong type".to_string(),
            Self::AuthenticationFailed | Self::AccountInactive => NO_ACTIVE_ACCOUNT.to_string(),
            Self::StorageUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::Encode(_) => "Token could not be issued".to_string(),
            other => other.to_string(),
        }
    }
}
