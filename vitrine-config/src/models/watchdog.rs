use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Stall watchdog tuning for adaptive video.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// How often the watchdog samples the element (ms).
    pub interval_ms: u64,
    /// How long the position may stay frozen while nominally playing before
    /// it counts as a stall (ms).
    pub stall_threshold_ms: u64,
    /// Minimum spacing between two recovery escalations (ms).
    pub recovery_cooldown_ms: u64,
    /// How far back (seconds) the last escalation tier nudges the position.
    pub nudge_seconds: f64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_ms: 4_000,
            stall_threshold_ms: 4_000,
            recovery_cooldown_ms: 3_000,
            nudge_seconds: 0.1,
        }
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }

    pub fn recovery_cooldown(&self) -> Duration {
        Duration::from_millis(self.recovery_cooldown_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "watchdog.interval_ms",
            });
        }
        if self.stall_threshold_ms == 0 {
            return Err(ConfigError::Zero {
                field: "watchdog.stall_threshold_ms",
            });
        }
        if self.recovery_cooldown_ms == 0 {
            return Err(ConfigError::Zero {
                field: "watchdog.recovery_cooldown_ms",
            });
        }
        if !self.nudge_seconds.is_finite() || self.nudge_seconds < 0.0 {
            return Err(ConfigError::Invalid {
                field: "watchdog.nudge_seconds",
                reason: format!("{} is not a non-negative number", self.nudge_seconds),
            });
        }
        Ok(())
    }
}
