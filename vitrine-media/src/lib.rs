//! Vitrine media runtime
//!
//! Client-side playback logic for a content site that mounts many small media
//! units on one page: waveform audio players, adaptive background video and
//! ambient loops. The crate never touches a DOM directly; hosts implement the
//! platform seams ([`surface::VideoSurface`], [`streaming::AdaptiveSession`],
//! [`waveform::AudioEngine`], [`peaks::PeakSource`]) and forward platform
//! events into the components.
//!
//! Notes
//! - [`PlaybackCoordinator`] and [`VisibilityBroadcaster`] are per-page context
//!   objects bundled in [`MediaRuntime`], not globals, so tests get isolated
//!   instances.
//! - Nothing here propagates failures into page code. Fetch helpers return
//!   [`Result`]; component entry points degrade to a neutral state instead.

pub mod coordinator;
pub mod error;
pub mod ids;
pub mod mount;
pub mod peaks;
pub mod resumable;
pub mod runtime;
pub mod streaming;
pub mod surface;
pub mod time;
pub mod visibility;
pub mod waveform;

pub use coordinator::{PlaybackCoordinator, PlaybackHandle};
pub use error::{FaultClass, MediaError, Result};
pub use ids::PlayerId;
pub use mount::MediaMount;
pub use resumable::{HiddenPlaybackMemo, VisibilityResumableVideo};
pub use runtime::MediaRuntime;
pub use streaming::{StreamState, StreamingVideoController};
pub use time::{SystemTimeProvider, TimeProvider, VirtualTimeProvider};
pub use visibility::{
    AnimationGate, DocumentVisibility, Subscription, VisibilityBroadcaster,
    VisibilityState,
};
pub use waveform::{WaveformAudioPlayer, WaveformShape, WaveformView};
