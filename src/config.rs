//! Breaker configuration
//!
//! Loading is left to the embedding application; with the `serde` feature
//! enabled, [`BreakerConfig`] can be deserialized from whatever format it
//! already uses. `timeout` serializes as `{ secs, nanos }`.

use crate::error::ConfigError;
use std::time::Duration;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BreakerConfig {
    /// Number of consecutive failures (each within `timeout` of the
    /// previous one) that opens the circuit
    pub error_threshold: u32,

    /// Number of consecutive successes in half-open that closes the circuit
    pub success_threshold: u32,

    /// Error-count expiry window while closed, and cool-down while open
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Create a configuration from its three parameters
    pub fn new(error_threshold: u32, success_threshold: u32, timeout: Duration) -> Self {
        Self {
            error_threshold,
            success_threshold,
            timeout,
        }
    }

    /// Check that every threshold and the timeout are non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.error_threshold == 0 {
            return Err(ConfigError::ZeroErrorThreshold);
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::ZeroSuccessThreshold);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
