//! Credential store collaborator and a file-backed implementation.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::password;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub login: String,
    pub active: bool,
}

/// Why a credential lookup did not produce a principal.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AuthFailure {
    /// Unknown login or wrong secret. Deliberately not split further.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account inactive")]
    Inactive,

    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Looks up a principal by login identifier and secret.
pub trait CredentialStore: Send + Sync {
    fn authenticate(&self, login_id: &str, secret: &str) -> Result<Principal, AuthFailure>;
}

/// A stored principal with its argon2 secret hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub login: String,
    pub password_hash: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// Credential store held in memory, optionally loaded from a TOML file of
/// `[[users]]` tables.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: HashMap<String, UserRecord>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a users file body.
    pub fn from_toml_str(content: &str) -> tessera_core::Result<Self> {
        let file: UsersFile = toml::from_str(content)?;
        let mut store = Self::new();
        for record in file.users {
            if store.users.contains_key(&record.login) {
                return Err(tessera_core::Error::Config(format!(
                    "Duplicate login in users file: {}",
                    record.login
                )));
            }
            store.insert(record);
        }
        Ok(store)
    }

    pub fn load(path: &Path) -> tessera_core::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            tessera_core::Error::Config(format!(
                "Failed to read users file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn insert(&mut self, record: UserRecord) {
        self.users.insert(record.login.clone(), record);
    }

    /// Hash `secret` and store a new principal.
    pub fn add_user(
        &mut self,
        id: &str,
        login: &str,
        secret: &str,
        active: bool,
    ) -> Result<(), password::HashError> {
        let password_hash = password::hash_secret(secret)?;
        self.insert(UserRecord {
            id: id.to_string(),
            login: login.to_string(),
            password_hash,
            active,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn authenticate(&self, login_id: &str, secret: &str) -> Result<Principal, AuthFailure> {
        let Some(user) = self.users.get(login_id) else {
            // Pay the same hashing cost as a known login with a wrong secret.
            password::verify_decoy(secret);
            return Err(AuthFailure::InvalidCredentials);
        };

        let valid = password::verify_secret(secret, &user.password_hash).map_err(|e| {
            warn!(login = %login_id, error = %e, "Stored secret hash is unreadable");
            AuthFailure::Unavailable("stored secret hash is unreadable".into())
        })?;
        if !valid {
            return Err(AuthFailure::InvalidCredentials);
        }
        if !user.active {
            return Err(AuthFailure::Inactive);
        }

        Ok(Principal {
            id: user.id.clone(),
            login: user.login.clone(),
            active: user.active,
        })
    }
}
