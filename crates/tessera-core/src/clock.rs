//! Injectable time source.
//!
//! Every time-dependent decision in the token engine reads "now" through a
//! [`Clock`] so tests can pin the instant exactly.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Supplies the current UTC instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock frozen at a given instant until moved explicitly.
#[derive(Debug)]
pub struct FixedClock {
    instant: RwLock<SystemTime>,
}

impl FixedClock {
    pub const fn new(instant: SystemTime) -> Self {
        Self {
            instant: RwLock::new(instant),
        }
    }

    /// Clock pinned at `secs` seconds after the Unix epoch.
    pub fn at_unix(secs: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(secs))
    }

    pub fn set(&self, instant: SystemTime) {
        *self.instant.write().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.instant.write().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }

    pub fn rewind(&self, by: Duration) {
        let mut guard = self.instant.write().unwrap_or_else(PoisonError::into_inner);
        *guard -= by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        *self.instant.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whole seconds since the Unix epoch, truncated toward zero.
///
/// Instants before the epoch collapse to `0`.
pub fn unix_secs(instant: SystemTime) -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    let secs = instant
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    secs
}
