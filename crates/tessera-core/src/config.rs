//! Configuration resolution for tessera.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/tessera/config.toml`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (`TESSERA_*`)
//!
//! The resolved [`Config`] is immutable for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Development secret used when nothing else is configured.
pub const DEV_SIGNING_KEY: &str = "dev-secret-change-me";

/// Algorithms the token codec knows how to drive.
pub const SUPPORTED_ALGORITHMS: &[&str] = &[
    "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256",
    "ES384", "EdDSA",
];

/// Token kinds that may be named in `policy.auth_token_kinds`.
pub const TOKEN_KIND_NAMES: &[&str] = &["access", "refresh", "sliding"];

/// Complete tessera configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub lifetimes: LifetimeConfig,
    #[serde(default)]
    pub claims: ClaimNameConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Key material and algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SigningConfig {
    /// JWS algorithm name, e.g. `HS256` or `RS256`.
    pub algorithm: String,
    /// HMAC secret, or a PEM private key for asymmetric algorithms.
    pub signing_key: String,
    /// PEM public key. Ignored for HMAC algorithms.
    pub verifying_key: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
            signing_key: DEV_SIGNING_KEY.to_string(),
            verifying_key: None,
        }
    }
}

impl SigningConfig {
    pub fn is_hmac(&self) -> bool {
        self.algorithm.starts_with("HS")
    }

    pub fn uses_dev_key(&self) -> bool {
        self.signing_key == DEV_SIGNING_KEY
    }
}

/// Token lifetimes in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifetimeConfig {
    pub access_token_secs: i64,
    pub refresh_token_secs: i64,
    pub sliding_token_secs: i64,
    /// Absolute window after issue during which a sliding token may be extended.
    pub sliding_refresh_secs: i64,
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            access_token_secs: 5 * 60,
            refresh_token_secs: 24 * 60 * 60,
            sliding_token_secs: 5 * 60,
            sliding_refresh_secs: 24 * 60 * 60,
        }
    }
}

/// Names of the claims the engine manages. `exp` and `iat` are fixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClaimNameConfig {
    pub token_type: String,
    pub jti: String,
    pub sliding_refresh_exp: String,
    pub user_id: String,
}

impl Default for ClaimNameConfig {
    fn default() -> Self {
        Self {
            token_type: "token_type".to_string(),
            jti: "jti".to_string(),
            sliding_refresh_exp: "refresh_exp".to_string(),
            user_id: "user_id".to_string(),
        }
    }
}

/// Revocation and acceptance policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Consult the blacklist during verification.
    pub blacklist_enabled: bool,
    /// Issue a new refresh token on every pair refresh.
    pub rotate_refresh_tokens: bool,
    /// When rotating, blacklist the consumed refresh token.
    pub blacklist_after_rotation: bool,
    /// Accept tokens when the blacklist store cannot be reached.
    pub blacklist_fail_open: bool,
    /// Accepted `Authorization` header schemes.
    pub auth_header_types: Vec<String>,
    /// Token kinds accepted for resource access.
    pub auth_token_kinds: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            blacklist_enabled: false,
            rotate_refresh_tokens: false,
            blacklist_after_rotation: true,
            blacklist_fail_open: false,
            auth_header_types: vec!["Bearer".to_string()],
            auth_token_kinds: vec!["access".to_string()],
        }
    }
}

/// Where the bundled credential store reads principals from.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub users_file: Option<PathBuf>,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Parse a config from TOML text. Missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject settings the token engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let signing = &self.signing;
        if !SUPPORTED_ALGORITHMS.contains(&signing.algorithm.as_str()) {
            return Err(Error::Config(format!(
                "Unsupported signing algorithm: {}",
                signing.algorithm
            )));
        }
        if signing.signing_key.is_empty() {
            return Err(Error::Config("signing_key must not be empty".into()));
        }
        if !signing.is_hmac() && signing.verifying_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Config(format!(
                "verifying_key is required for {}",
                signing.algorithm
            )));
        }

        let lifetimes = [
            ("access_token_secs", self.lifetimes.access_token_secs),
            ("refresh_token_secs", self.lifetimes.refresh_token_secs),
            ("sliding_token_secs", self.lifetimes.sliding_token_secs),
            ("sliding_refresh_secs", self.lifetimes.sliding_refresh_secs),
        ];
        for (name, value) in lifetimes {
            if value <= 0 {
                return Err(Error::Config(format!("{name} must be positive, got {value}")));
            }
        }

        let names = [
            self.claims.token_type.as_str(),
            self.claims.jti.as_str(),
            self.claims.sliding_refresh_exp.as_str(),
            self.claims.user_id.as_str(),
            "exp",
            "iat",
        ];
        let mut seen = HashSet::new();
        for name in names {
            if name.is_empty() {
                return Err(Error::Config("claim names must not be empty".into()));
            }
            if !seen.insert(name) {
                return Err(Error::Config(format!("claim name '{name}' is used twice")));
            }
        }

        if self.policy.auth_header_types.is_empty() {
            return Err(Error::Config("auth_header_types must not be empty".into()));
        }
        if self.policy.auth_token_kinds.is_empty() {
            return Err(Error::Config("auth_token_kinds must not be empty".into()));
        }
        for kind in &self.policy.auth_token_kinds {
            if !TOKEN_KIND_NAMES.contains(&kind.as_str()) {
                return Err(Error::Config(format!("Unknown token kind: {kind}")));
            }
        }

        Ok(())
    }
}

/// Load configuration with hierarchical resolution, reading overrides from
/// the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    load_config_with_env(explicit, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with_env(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = explicit {
        config = load_config_file(path)?;
    } else if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tessera").join("config.toml"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(val) = env("TESSERA_ALGORITHM") {
        config.signing.algorithm = val;
    }
    if let Some(val) = env("TESSERA_SIGNING_KEY") {
        config.signing.signing_key = val;
    }
    if let Some(val) = env("TESSERA_VERIFYING_KEY") {
        config.signing.verifying_key = Some(val);
    }
    if let Some(val) = env("TESSERA_ACCESS_TOKEN_SECS") {
        config.lifetimes.access_token_secs = parse_env("TESSERA_ACCESS_TOKEN_SECS", &val)?;
    }
    if let Some(val) = env("TESSERA_REFRESH_TOKEN_SECS") {
        config.lifetimes.refresh_token_secs = parse_env("TESSERA_REFRESH_TOKEN_SECS", &val)?;
    }
    if let Some(val) = env("TESSERA_SLIDING_TOKEN_SECS") {
        config.lifetimes.sliding_token_secs = parse_env("TESSERA_SLIDING_TOKEN_SECS", &val)?;
    }
    if let Some(val) = env("TESSERA_SLIDING_REFRESH_SECS") {
        config.lifetimes.sliding_refresh_secs = parse_env("TESSERA_SLIDING_REFRESH_SECS", &val)?;
    }
    if let Some(val) = env("TESSERA_BLACKLIST_ENABLED") {
        config.policy.blacklist_enabled = parse_env("TESSERA_BLACKLIST_ENABLED", &val)?;
    }
    if let Some(val) = env("TESSERA_ROTATE_REFRESH_TOKENS") {
        config.policy.rotate_refresh_tokens = parse_env("TESSERA_ROTATE_REFRESH_TOKENS", &val)?;
    }
    if let Some(val) = env("TESSERA_USERS_FILE") {
        config.credentials.users_file = Some(PathBuf::from(val));
    }
    if let Some(val) = env("TESSERA_LOG_LEVEL") {
        config.logging.level = val;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {key}: {value}")))
}
