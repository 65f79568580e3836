//! argon2id hashing for principal secrets.
//!
//! Stored hashes are PHC strings, so parameters travel with each hash and
//! older entries keep verifying after the defaults change.

use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

pub use argon2::password_hash::Error as HashError;

/// Stand-in hash checked when a login is unknown, built with the same
/// parameters as real entries so both paths cost the same.
static DECOY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_secret("tessera-decoy-secret").ok());

/// Hash a secret with a fresh random salt.
pub fn hash_secret(secret: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(secret.as_bytes(), &salt)?
        .to_string())
}

/// Check a secret against a stored PHC hash.
///
/// A malformed stored hash is an error; a mismatch is `Ok(false)`.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, HashError> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Spend one verification on the decoy hash. Always reports no match.
pub fn verify_decoy(secret: &str) -> bool {
    if let Some(hash) = DECOY_HASH.as_deref() {
        let _ = verify_secret(secret, hash);
    }
    false
}
