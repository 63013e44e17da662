//! Bandwidth- and device-aware cap on the highest rendition a session may
//! pick.

use serde::{Deserialize, Serialize};
use vitrine_config::StreamingConfig;

use super::manifest::StreamQualityLevel;

/// Network hints reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkConditions {
    /// The user asked for reduced data usage.
    pub save_data: bool,
    /// Estimated downlink in megabits per second.
    pub downlink_mbps: Option<f64>,
}

/// Coarse hardware hints reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub cpu_cores: Option<u32>,
    pub memory_gb: Option<f64>,
}

impl DeviceProfile {
    const LOW_END_CORES: u32 = 4;
    const LOW_END_MEMORY_GB: f64 = 4.0;

    fn is_known(&self) -> bool {
        self.cpu_cores.is_some() || self.memory_gb.is_some()
    }

    pub fn is_low_end(&self) -> bool {
        self.cpu_cores.is_some_and(|cores| cores <= Self::LOW_END_CORES)
            || self.memory_gb.is_some_and(|memory| memory <= Self::LOW_END_MEMORY_GB)
    }
}

/// Which hint decided the cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum CapReason {
    SaveData,
    Downlink { mbps: f64 },
    Device { low_end: bool },
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityCap {
    /// Highest level index the session may select.
    pub max_level: usize,
    /// Height ceiling that produced `max_level`; `None` for save-data.
    pub max_height: Option<u32>,
    pub reason: CapReason,
}

/// Height ceiling for the given hints, or `None` when save-data pins the
/// lowest level outright.
///
/// Precedence: save-data, then downlink tiers, then the device heuristic,
/// then the configured default.
pub fn height_ceiling(
    config: &StreamingConfig,
    network: Option<&NetworkConditions>,
    device: Option<&DeviceProfile>,
) -> (Option<u32>, CapReason) {
    if network.is_some_and(|net| net.save_data) {
        return (None, CapReason::SaveData);
    }

    if let Some(mbps) = network
        .and_then(|net| net.downlink_mbps)
        .filter(|mbps| mbps.is_finite() && *mbps >= 0.0)
    {
        let tiers = config.tiers_descending();
        let height = tiers
            .iter()
            .find(|tier| mbps >= tier.min_downlink_mbps)
            .or(tiers.last())
            .map(|tier| tier.max_height)
            .unwrap_or(config.default_max_height);
        return (Some(height), CapReason::Downlink { mbps });
    }

    if let Some(device) = device.filter(|device| device.is_known()) {
        let low_end = device.is_low_end();
        let height = if low_end {
            config.low_end_max_height
        } else {
            config.capable_max_height
        };
        return (Some(height), CapReason::Device { low_end });
    }

    (Some(config.default_max_height), CapReason::Default)
}

/// Cap for `levels` (sorted lowest first). `None` when there are no levels.
pub fn compute_cap(
    levels: &[StreamQualityLevel],
    config: &StreamingConfig,
    network: Option<&NetworkConditions>,
    device: Option<&DeviceProfile>,
) -> Option<QualityCap> {
    if levels.is_empty() {
        return None;
    }
    let (max_height, reason) = height_ceiling(config, network, device);
    let max_level = match max_height {
        None => 0,
        Some(ceiling) => levels
            .iter()
            .rposition(|level| level.height.is_none_or(|height| height <= ceiling))
            .unwrap_or(0),
    };
    Some(QualityCap {
        max_level,
        max_height,
        reason,
    })
}
