//! Configuration loading and representation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`CompletionConfig::lock_timeout`].
pub const LOCK_TIMEOUT_ENV: &str = "STOREFRONT_LOCK_TIMEOUT_MS";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 500;

/// Settings for the order completion workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Upper bound on how long one completion waits to claim its inventory
    /// records before giving up with a retryable failure.
    #[serde(default = "default_lock_timeout_ms")]
    lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl CompletionConfig {
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            lock_timeout_ms: u64::try_from(lock_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (the environment in production).
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.lock_timeout_ms = ms,
                Err(e) => tracing::warn!(
                    key = LOCK_TIMEOUT_ENV,
                    value = %raw,
                    error = %e,
                    "ignoring invalid lock timeout; using default"
                ),
            }
        }

        config
    }
}
