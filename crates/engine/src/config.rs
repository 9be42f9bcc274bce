//! Engine tuning knobs.

use chrono::Duration;

use crate::error::{EngineError, Result};

/// Limits and defaults applied by the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hold lease used when the caller does not ask for one.
    pub default_hold_seconds: u64,
    /// Longest lease a hold may have, measured from now.
    pub max_hold_seconds: u64,
    /// Upper bound on units in a single hold.
    pub max_tickets_per_hold: u32,
    /// Upper bound on a tier's capacity.
    pub max_tier_capacity: u32,
    /// Candidate selection rounds before `reserve` gives up on stragglers.
    pub reserve_attempts: u32,
    /// Holds processed per sweep page.
    pub sweep_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_hold_seconds: 600,
            max_hold_seconds: 3600,
            max_tickets_per_hold: 10,
            max_tier_capacity: 100_000,
            reserve_attempts: 3,
            sweep_batch_size: 500,
        }
    }
}

impl EngineConfig {
    /// Resolves a requested lease into a duration within the configured bounds.
    pub fn hold_duration(&self, requested: Option<u64>) -> Result<Duration> {
        let seconds = requested.unwrap_or(self.default_hold_seconds);
        if seconds == 0 {
            return Err(EngineError::InvalidArgument(
                "hold_seconds must be greater than 0".to_string(),
            ));
        }
        if seconds > self.max_hold_seconds {
            return Err(EngineError::InvalidArgument(format!(
                "hold_seconds {seconds} exceeds maximum {}",
                self.max_hold_seconds
            )));
        }
        Ok(Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX)))
    }

    /// Longest lease as a duration.
    pub fn max_hold(&self) -> Duration {
        Duration::seconds(i64::try_from(self.max_hold_seconds).unwrap_or(i64::MAX))
    }
}
