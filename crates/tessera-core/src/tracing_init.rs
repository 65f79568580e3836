//! Logging setup for tessera binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise every crate in `targets` logs at
/// `logging.level`. JSON lines are emitted when `logging.json` or
/// `force_json` is set. Output goes to stderr so stdout stays
/// machine-readable.
pub fn init_tracing(targets: &[&str], logging: &LoggingConfig, force_json: bool) {
    let env_filter = std::env::var("RUST_LOG").map_or_else(
        |_| EnvFilter::new(default_directives(targets, &logging.level)),
        EnvFilter::new,
    );
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if logging.json || force_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt)
            .init();
    }
}

/// Filter directives putting each target at `level`, e.g.
/// `tessera=info,tessera_auth=info`.
pub fn default_directives(targets: &[&str], level: &str) -> String {
    targets
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}
