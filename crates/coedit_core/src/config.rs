//! Runtime configuration for lock expiry.
//!
//! # Responsibility
//! - Hold the lock timeout used by the lock manager.
//! - Parse overrides from the environment.
//!
//! # Invariants
//! - The timeout is always strictly positive.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Environment variable overriding the lock timeout, in whole minutes.
pub const LOCK_TIMEOUT_ENV: &str = "COEDIT_LOCK_TIMEOUT_MINUTES";

/// Default idle time after which a lock without heartbeat is vacant.
pub const DEFAULT_LOCK_TIMEOUT_MINUTES: u64 = 15;

/// Configuration parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Timeout value is not a positive integer.
    InvalidLockTimeout(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLockTimeout(value) => write!(
                f,
                "invalid lock timeout `{value}`; expected a positive number of minutes"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Lock expiry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    timeout: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_MINUTES * 60),
        }
    }
}

impl LockPolicy {
    /// Builds a policy from an explicit timeout.
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidLockTimeout(format!("{timeout:?}")));
        }
        Ok(Self { timeout })
    }

    pub fn from_minutes(minutes: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Reads [`LOCK_TIMEOUT_ENV`], falling back to the default when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(LOCK_TIMEOUT_ENV) {
            Ok(value) => Self::parse_minutes(&value),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parses a whole number of minutes.
    pub fn parse_minutes(value: &str) -> Result<Self, ConfigError> {
        let minutes = value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidLockTimeout(value.to_string()))?;
        if minutes == 0 {
            return Err(ConfigError::InvalidLockTimeout(value.to_string()));
        }
        Self::from_minutes(minutes)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Timeout in milliseconds, saturated to `i64::MAX`.
    pub fn timeout_ms(&self) -> i64 {
        i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX)
    }
}
