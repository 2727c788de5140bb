//! Reconnect backoff policy
//!
//! Exponential: start at the base delay, double after each consecutive
//! failure, clamp at the maximum, reset to the base after a success.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconnection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectConfig {
    /// First retry delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for the retry delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Validate delay bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "reconnect.max_delay_ms ({}) must not be lower than base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }
}

/// Next retry delay after a failure waited `previous` (pure function)
pub fn next_delay(previous: Duration, max: Duration) -> Duration {
    previous.saturating_mul(2).min(max)
}

/// Stateful wrapper around [`next_delay`] owned by the session machine
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base: config.base_delay(),
            max: config.max_delay(),
            current: config.base_delay(),
        }
    }

    /// Delay to wait after the next failure
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record a failure whose wait has been served
    pub fn advance(&mut self) {
        self.current = next_delay(self.current, self.max);
    }

    /// Record a successful connect
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}
