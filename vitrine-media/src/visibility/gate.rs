use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Subscription, VisibilityBroadcaster, VisibilityState};

/// Cached view of the broadcaster for hot paths (progress ticks, animation
/// frames) that only need a cheap "may I run?" check.
pub struct AnimationGate {
    running: Arc<AtomicBool>,
    subscription: Subscription,
}

impl fmt::Debug for AnimationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationGate")
            .field("running", &self.is_running())
            .finish()
    }
}

impl AnimationGate {
    pub fn new(broadcaster: &VisibilityBroadcaster) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let subscription = broadcaster.subscribe(move |state| {
            flag.store(state == VisibilityState::Active, Ordering::Release);
        });
        Self {
            running,
            subscription,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop tracking the broadcaster. The gate stays at its last value.
    pub fn release(&mut self) {
        self.subscription.cancel();
    }
}
