use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Hidden-tab resume behaviour for ambient video.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResumeConfig {
    /// Spacing between resume attempts while the tab is hidden (ms).
    pub retry_interval_ms: u64,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 1_000,
        }
    }
}

impl ResumeConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "resume.retry_interval_ms",
            });
        }
        Ok(())
    }
}
