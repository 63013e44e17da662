use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// One bandwidth threshold: an estimated downlink of at least
/// `min_downlink_mbps` allows renditions up to `max_height` lines.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct QualityTier {
    pub min_downlink_mbps: f64,
    pub max_height: u32,
}

impl QualityTier {
    pub const fn new(min_downlink_mbps: f64, max_height: u32) -> Self {
        Self {
            min_downlink_mbps,
            max_height,
        }
    }
}

/// Adaptive streaming settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Bandwidth to resolution tiers. Order in the file does not matter.
    pub quality_tiers: Vec<QualityTier>,
    /// Cap used when no network or device hint is available.
    pub default_max_height: u32,
    /// Cap used when the device looks constrained (few cores or little memory).
    pub low_end_max_height: u32,
    /// Cap used when the device reports plenty of headroom.
    pub capable_max_height: u32,
    /// Retries for the manifest request before it is classified fatal.
    pub manifest_retries: u32,
    /// Retries for each segment request before it is classified fatal.
    pub segment_retries: u32,
    /// Fixed delay between load retries (ms).
    pub retry_backoff_ms: u64,
    /// Fatal network errors tolerated (each restarts loading) before teardown.
    pub max_network_recoveries: u32,
    /// Fatal decode errors tolerated (each tries in-place recovery) before teardown.
    pub max_media_recoveries: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            quality_tiers: vec![
                QualityTier::new(5.0, 1080),
                QualityTier::new(2.5, 720),
                QualityTier::new(1.2, 480),
                QualityTier::new(0.0, 360),
            ],
            default_max_height: 720,
            low_end_max_height: 480,
            capable_max_height: 1080,
            manifest_retries: 3,
            segment_retries: 3,
            retry_backoff_ms: 1_000,
            max_network_recoveries: 3,
            max_media_recoveries: 2,
        }
    }
}

impl StreamingConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Tiers ordered from the highest bandwidth threshold down.
    pub fn tiers_descending(&self) -> Vec<QualityTier> {
        let mut tiers = self.quality_tiers.clone();
        tiers.sort_by(|a, b| b.min_downlink_mbps.total_cmp(&a.min_downlink_mbps));
        tiers
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.quality_tiers.is_empty() {
            return Err(ConfigError::NoQualityTiers);
        }
        if let Some(tier) = self
            .quality_tiers
            .iter()
            .find(|tier| !tier.min_downlink_mbps.is_finite() || tier.min_downlink_mbps < 0.0)
        {
            return Err(ConfigError::Invalid {
                field: "streaming.quality_tiers",
                reason: format!("min_downlink_mbps {} is not a non-negative number", tier.min_downlink_mbps),
            });
        }
        if self.default_max_height == 0 {
            return Err(ConfigError::Zero {
                field: "streaming.default_max_height",
            });
        }
        Ok(())
    }
}
