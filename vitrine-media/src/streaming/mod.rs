//! Adaptive streaming video: manifest levels, quality capping, stall
//! recovery and the controller tying them to a host session.

mod capping;
mod controller;
mod manifest;
mod platform;
mod watchdog;

pub use capping::{
    CapReason, DeviceProfile, NetworkConditions, QualityCap, compute_cap, height_ceiling,
};
pub use controller::{DeliveryMode, StreamState, StreamingVideoController};
pub use manifest::{
    HLS_MIME, StreamQualityLevel, fetch_manifest_levels, fetch_manifest_levels_with_retry,
    parse_master_playlist,
};
pub use platform::{
    AdaptiveSession, ReadinessSignal, SessionConfig, StreamError, StreamErrorKind, StreamEvent,
    StreamPlatform,
};
pub use watchdog::{RecoveryAction, StallWatchdog, WatchdogObservation};
