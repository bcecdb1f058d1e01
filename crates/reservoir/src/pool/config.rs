//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for connection pooling
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Number of connections opened eagerly by `Pool::create`
    pub initial_size: usize,
    /// Capacity of the idle container and upper bound on tracked connections
    pub max_size: usize,
    /// Bound on the liveness probe run when a connection is released
    pub validation_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 2,
            max_size: 5,
            validation_timeout: Duration::from_secs(1),
        }
    }
}

impl PoolConfig {
    /// Config with the given sizes and the default validation timeout.
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        Self {
            initial_size,
            max_size,
            ..Self::default()
        }
    }

    /// Replace the validation timeout.
    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.initial_size == 0 {
            return Err(Error::configuration("initial_size must be greater than 0"));
        }
        if self.max_size == 0 {
            return Err(Error::configuration("max_size must be greater than 0"));
        }
        if self.initial_size > self.max_size {
            return Err(Error::configuration(format!(
                "initial_size ({}) must not exceed max_size ({})",
                self.initial_size, self.max_size
            )));
        }
        if self.validation_timeout.is_zero() {
            return Err(Error::configuration(
                "validation_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}
