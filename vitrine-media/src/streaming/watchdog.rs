//! Stall detection with escalating, rate-limited recovery.
//!
//! The watchdog is a plain state machine fed with observations; the
//! controller owns the timer that samples the element.

use std::time::{Duration, Instant};

use vitrine_config::WatchdogConfig;

/// Position change below this (seconds) counts as frozen.
const PROGRESS_EPSILON: f64 = 0.01;

/// One sample of the element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchdogObservation {
    /// Nominally playing: not paused and not ended.
    pub playing: bool,
    pub seeking: bool,
    /// Document visible. Background tabs are throttled by the platform and
    /// must not look like stalls.
    pub foreground: bool,
    pub position: f64,
}

/// Recovery step, escalating with each consecutive stall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryAction {
    /// Ask the element to play again.
    Resume,
    /// Tear the adaptive session down and attach a fresh one at the same
    /// position.
    Rebind,
    /// Seek slightly backwards to step over a bad spot.
    Nudge { to: f64 },
}

#[derive(Debug, Clone, Copy)]
struct PlaybackHealthSample {
    last_position: f64,
    /// When `last_position` was last seen changing (or sampling restarted).
    progressed_at: Instant,
    consecutive_stalls: u32,
    last_recovery: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct StallWatchdog {
    stall_threshold: Duration,
    cooldown: Duration,
    nudge_seconds: f64,
    sample: Option<PlaybackHealthSample>,
}

impl StallWatchdog {
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            stall_threshold: config.stall_threshold(),
            cooldown: config.recovery_cooldown(),
            nudge_seconds: config.nudge_seconds,
            sample: None,
        }
    }

    /// Feed one observation. Returns the recovery step to take, if any.
    ///
    /// A stall is a position frozen for longer than the threshold while the
    /// element is nominally playing, not seeking and in the foreground. At
    /// most one escalation fires per cooldown window, and any progress
    /// resets the escalation ladder.
    pub fn observe(&mut self, obs: WatchdogObservation, now: Instant) -> Option<RecoveryAction> {
        let Some(sample) = self.sample.as_mut() else {
            self.sample = Some(PlaybackHealthSample {
                last_position: obs.position,
                progressed_at: now,
                consecutive_stalls: 0,
                last_recovery: None,
            });
            return None;
        };

        let moved = (obs.position - sample.last_position).abs() > PROGRESS_EPSILON;
        if moved {
            sample.last_position = obs.position;
            sample.progressed_at = now;
            sample.consecutive_stalls = 0;
            return None;
        }

        if !obs.playing || obs.seeking || !obs.foreground {
            // Frozen for a legitimate reason; restart the clock.
            sample.progressed_at = now;
            return None;
        }

        if now.saturating_duration_since(sample.progressed_at) < self.stall_threshold {
            return None;
        }
        if let Some(last) = sample.last_recovery
            && now.saturating_duration_since(last) < self.cooldown
        {
            return None;
        }

        sample.consecutive_stalls += 1;
        sample.last_recovery = Some(now);
        let action = match sample.consecutive_stalls {
            1 => RecoveryAction::Resume,
            2 => RecoveryAction::Rebind,
            _ => RecoveryAction::Nudge {
                to: (obs.position - self.nudge_seconds).max(0.0),
            },
        };
        if let RecoveryAction::Nudge { to } = action {
            // Landing on the nudge target is not progress.
            sample.last_position = to;
        }
        log::debug!(
            "playback frozen at {:.2}s (stall #{}); escalating to {action:?}",
            obs.position,
            sample.consecutive_stalls
        );
        Some(action)
    }

    pub fn consecutive_stalls(&self) -> u32 {
        self.sample.map_or(0, |sample| sample.consecutive_stalls)
    }

    pub fn reset(&mut self) {
        self.sample = None;
    }
}
