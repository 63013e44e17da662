use std::time::{Duration, Instant};

/// Progress emitted to the page at a bounded rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub position: f64,
    pub duration: Option<f64>,
}

impl ProgressUpdate {
    /// Played fraction in `0..=1`, when the duration is known.
    pub fn fraction(&self) -> Option<f64> {
        self.duration
            .filter(|duration| duration.is_finite() && *duration > 0.0)
            .map(|duration| (self.position / duration).clamp(0.0, 1.0))
    }
}

/// Leading-edge rate limiter for progress callbacks.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Whether an update at `now` may be emitted; records it when so.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_emit = None;
    }
}
