use std::time::{Duration, Instant};

/// Where a video was when the tab hid it while it was playing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HiddenPlaybackMemo {
    pub hidden_at: Instant,
    pub position: f64,
}

impl HiddenPlaybackMemo {
    pub fn new(hidden_at: Instant, position: f64) -> Self {
        Self {
            hidden_at,
            position,
        }
    }

    /// Position the video would have reached at `now` had it kept playing.
    pub fn target_position(&self, now: Instant, duration: Option<f64>, looping: bool) -> f64 {
        reconcile_position(
            self.position,
            now.saturating_duration_since(self.hidden_at),
            duration,
            looping,
        )
    }
}

/// `position + elapsed`, wrapped modulo `duration` for looping media and
/// clamped to `duration` otherwise. An unknown or unusable duration leaves
/// the sum as is.
pub fn reconcile_position(
    position: f64,
    elapsed: Duration,
    duration: Option<f64>,
    looping: bool,
) -> f64 {
    let target = position.max(0.0) + elapsed.as_secs_f64();
    match duration.filter(|duration| duration.is_finite() && *duration > 0.0) {
        Some(duration) if looping => target.rem_euclid(duration),
        Some(duration) => target.min(duration),
        None => target,
    }
}
