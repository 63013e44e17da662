//! Seams to the host's adaptive-streaming engine.

use std::sync::Arc;
use std::time::Duration;

use vitrine_config::StreamingConfig;

use super::capping::{DeviceProfile, NetworkConditions};
use super::manifest::StreamQualityLevel;
use crate::error::Result;
use crate::surface::VideoSurface;

/// Load policy handed to a new session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub manifest_retries: u32,
    pub segment_retries: u32,
    pub retry_backoff: Duration,
    /// Highest level index allowed at start-up, when already known.
    pub start_level_cap: Option<usize>,
}

impl SessionConfig {
    pub fn from_streaming(config: &StreamingConfig) -> Self {
        Self {
            manifest_retries: config.manifest_retries,
            segment_retries: config.segment_retries,
            retry_backoff: config.retry_backoff(),
            start_level_cap: None,
        }
    }
}

/// Error category reported by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    Network,
    Media,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    pub kind: StreamErrorKind,
    /// The session gave up on its own; non-fatal errors are informational.
    pub fatal: bool,
    pub details: String,
}

/// Events a session reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    ManifestParsed { levels: Vec<StreamQualityLevel> },
    LevelSwitched { level: usize },
    /// Buffer ran dry mid-playback.
    BufferStalled,
    Error(StreamError),
}

/// Moments at which a refused autoplay is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessSignal {
    CanPlay,
    CanPlayThrough,
    BecameVisible,
    /// The page went idle after load.
    Idle,
}

/// One adaptive-streaming session bound to a surface.
pub trait AdaptiveSession: Send + Sync {
    fn attach(&self, surface: Arc<dyn VideoSurface>);
    fn load_source(&self, url: &str);
    /// (Re)start fragment loading from the current position.
    fn start_load(&self);
    /// Attempt in-place recovery from a decode error.
    fn recover_media_error(&self);
    /// Limit automatic level selection to indices `<= cap`.
    fn set_level_cap(&self, cap: Option<usize>);
    fn destroy(&self);
}

pub trait StreamPlatform: Send + Sync {
    /// Whether an adaptive-streaming engine is available at all.
    fn supports_adaptive(&self) -> bool;
    fn create_session(&self, config: &SessionConfig) -> Result<Arc<dyn AdaptiveSession>>;
    fn network_conditions(&self) -> Option<NetworkConditions>;
    fn device_profile(&self) -> Option<DeviceProfile>;
}
