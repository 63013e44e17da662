use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Settings for the lazily-initialised waveform audio player.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Host serving precomputed peak descriptors. Descriptor paths are derived
    /// from each audio source's path, so this is only the prefix.
    pub base_url: String,
    /// Number of normalised amplitude bins kept per track.
    pub bins: usize,
    /// Minimum spacing between progress updates (ms). 200 gives ~5 per second.
    pub progress_interval_ms: u64,
    /// Pre-roll margin (px) hosts should give their viewport observer so the
    /// engine is ready slightly before the control scrolls into view.
    pub viewport_margin_px: u32,
    /// Volume applied to a freshly created engine.
    pub default_volume: f64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            base_url: "https://media.localhost/waveforms".to_string(),
            bins: 160,
            progress_interval_ms: 200,
            viewport_margin_px: 200,
            default_volume: 0.8,
        }
    }
}

impl WaveformConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.bins == 0 {
            return Err(ConfigError::Zero {
                field: "waveform.bins",
            });
        }
        if self.progress_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "waveform.progress_interval_ms",
            });
        }
        if let Err(err) = Url::parse(&self.base_url) {
            return Err(ConfigError::Invalid {
                field: "waveform.base_url",
                reason: err.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(ConfigError::Invalid {
                field: "waveform.default_volume",
                reason: format!("{} is outside 0.0..=1.0", self.default_volume),
            });
        }
        Ok(())
    }
}
