//! tessera
//!
//! Command-line front end for the token engine. Every command prints one
//! JSON document on stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{info, warn};

use tessera_auth::{
    AuthError, AuthService, Blacklist, CredentialStore, InMemoryBlacklist,
    InMemoryCredentialStore, JwtManager, TokenCodec, TokenFamily, TokenKind, password,
};
use tessera_core::config::{self, Config};
use tessera_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(version, about = "tessera - signed access, refresh and sliding tokens")]
struct Args {
    /// Path to a TOML config file. Defaults to the global config if present.
    #[arg(long, global = true, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for tokens.
    Obtain {
        #[arg(long)]
        login: String,

        #[arg(long, env = "TESSERA_SECRET", hide_env_values = true)]
        secret: String,

        /// Issue a single sliding token instead of an access/refresh pair.
        #[arg(long)]
        sliding: bool,
    },

    /// Exchange a refresh token for a new access token.
    Refresh { token: String },

    /// Extend a sliding token.
    RefreshSliding { token: String },

    /// Verify a token of one kind.
    Verify {
        token: String,

        #[arg(long, default_value = "access")]
        kind: TokenKind,
    },

    /// Verify a token of any kind.
    VerifyAny { token: String },

    /// Revoke a refresh or sliding token.
    Revoke { token: String },

    /// Show a token's claims without checking its signature.
    Inspect { token: String },

    /// Hash a secret for the users file.
    HashSecret {
        #[arg(long, env = "TESSERA_SECRET", hide_env_values = true)]
        secret: String,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config = config::load_config(args.config.as_deref())?;
    init_tracing(
        &["tessera", "tessera_auth", "tessera_core"],
        &config.logging,
        args.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        algorithm = %config.signing.algorithm,
        "Starting tessera"
    );
    if config.signing.uses_dev_key() {
        warn!("Using the built-in development signing key; set TESSERA_SIGNING_KEY");
    }

    match run(&config, args.command) {
        Ok(output) => {
            print_json(&output)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(CommandError::Auth(e)) => {
            warn!(error_kind = %e.kind(), error = %e, "Command failed");
            print_json(&json!({
                "error": e.kind().as_str(),
                "detail": e.public_message(),
            }))?;
            Ok(ExitCode::FAILURE)
        }
        Err(CommandError::Other(e)) => Err(e),
    }
}

enum CommandError {
    Auth(AuthError),
    Other(anyhow::Error),
}

impl From<AuthError> for CommandError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e)
    }
}

fn run(config: &Config, command: Command) -> Result<Value, CommandError> {
    match command {
        Command::Inspect { token } => {
            let claims = TokenCodec::decode_unverified(&token)?;
            return Ok(json!({ "claims": claims }));
        }
        Command::HashSecret { secret } => {
            let hash = password::hash_secret(&secret)
                .map_err(|e| anyhow::anyhow!("Secret hashing failed: {e}"))?;
            return Ok(json!({ "password_hash": hash }));
        }
        _ => {}
    }

    let jwt = build_manager(config)?;

    let output = match command {
        Command::Obtain {
            login,
            secret,
            sliding,
        } => {
            let service = AuthService::new(jwt, load_credentials(config)?);
            let family = if sliding {
                TokenFamily::Sliding
            } else {
                TokenFamily::Pair
            };
            to_value(&service.obtain(&login, &secret, family)?)?
        }
        Command::Refresh { token } => to_value(&jwt.refresh_pair(&token)?)?,
        Command::RefreshSliding { token } => to_value(&jwt.refresh_sliding(&token)?)?,
        Command::Verify { token, kind } => verified_output(&jwt.verify(&token, kind)?),
        Command::VerifyAny { token } => verified_output(&jwt.verify_any(&token)?),
        Command::Revoke { token } => {
            jwt.revoke(&token)?;
            json!({ "revoked": true })
        }
        Command::Inspect { .. } | Command::HashSecret { .. } => Value::Null,
    };
    Ok(output)
}

/// The CLI is one-shot, so revocations only live for the current process.
fn build_manager(config: &Config) -> anyhow::Result<JwtManager> {
    let blacklist: Arc<dyn Blacklist> = Arc::new(InMemoryBlacklist::new());
    Ok(JwtManager::builder(config)?.blacklist(blacklist).build()?)
}

fn load_credentials(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    let Some(path) = &config.credentials.users_file else {
        anyhow::bail!("credentials.users_file is not configured");
    };
    info!(path = %path.display(), "Loading users file");
    let store = InMemoryCredentialStore::load(path)?;
    info!(users = store.len(), "Users loaded");
    Ok(Arc::new(store))
}

fn verified_output(token: &tessera_auth::VerifiedToken) -> Value {
    json!({
        "valid": true,
        "kind": token.kind(),
        "claims": token.claims(),
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[allow(clippy::print_stdout)]
fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
