use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::DEFAULT_CAPACITY;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,

    #[error("read timeout must be greater than zero")]
    ZeroReadTimeout,

    #[error("history capacity must be at least one sample")]
    ZeroCapacity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    /// Samples kept per metric.
    pub history_capacity: usize,
    /// Upper bound on any single blocking read of the counter source.
    pub read_timeout: Duration,
    /// Report negative rates (counter reset/wrap) as 0 instead of passing
    /// them through.
    pub clamp_negative_rates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            history_capacity: DEFAULT_CAPACITY,
            read_timeout: Duration::from_secs(2),
            clamp_negative_rates: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroReadTimeout);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
