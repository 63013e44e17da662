use crate::error::Result;

/// Host-side video element as seen by the streaming controller and the
/// hidden-tab reconciler. Calls are expected to be cheap and non-blocking.
///
/// Implementations must not call back into the component synchronously while
/// holding their own locks; components never invoke a surface while holding
/// theirs.
pub trait VideoSurface: Send + Sync {
    /// Request playback. `Err(MediaError::PlayRejected)` when the platform
    /// refuses (autoplay policy, not yet ready).
    fn play(&self) -> Result<()>;
    fn pause(&self);

    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// Known, finite duration in seconds.
    fn duration(&self) -> Option<f64>;

    fn is_paused(&self) -> bool;
    fn is_seeking(&self) -> bool;
    fn is_ended(&self) -> bool;
    fn is_looping(&self) -> bool;

    /// Point the element directly at a URL (native playback path).
    fn set_src(&self, url: &str);
    fn clear_src(&self);
    /// Whether the element can play `mime` without an adaptive session.
    fn can_play_type(&self, mime: &str) -> bool;
}
