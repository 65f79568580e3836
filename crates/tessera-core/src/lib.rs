//! `tessera` Core Library
//!
//! Shared functionality for `tessera` components:
//! - Configuration resolution (defaults, TOML files, environment)
//! - Injectable time source
//! - Tracing initialisation
//! - Common error types

pub mod clock;
pub mod config;
pub mod error;
pub mod tracing_init;

pub use clock::{Clock, FixedClock, SystemClock, unix_secs};
pub use config::Config;
pub use error::{Error, Result};
