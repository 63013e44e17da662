//! Configuration for the Vitrine media playback runtime.
//!
//! Every knob the runtime reads (waveform peak host, progress throttling,
//! quality tiers, stall watchdog thresholds, hidden-tab resume cadence) lives
//! here with a compiled default, so a page can run with no configuration at
//! all. Overrides are loaded from TOML or JSON, see
//! [`MediaRuntimeConfig::load_from_env`].

pub mod error;
pub mod models;

pub use error::ConfigError;
pub use models::resume::ResumeConfig;
pub use models::streaming::{QualityTier, StreamingConfig};
pub use models::watchdog::WatchdogConfig;
pub use models::waveform::WaveformConfig;
pub use models::{ConfigSource, MediaRuntimeConfig};
