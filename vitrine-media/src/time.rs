//! Time abstraction for watchdog ticks, progress throttling and hidden-tab
//! arithmetic.
//!
//! Components read the clock through [`TimeProvider`] so tests can drive them
//! with [`VirtualTimeProvider`] instead of waiting on wall-clock time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of monotonic time and sleeps.
pub trait TimeProvider: Send + Sync + 'static {
    /// Get the current instant
    fn now(&self) -> Instant;

    /// Sleep for a duration (virtual providers complete it when time advances)
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;

    /// Clone the time provider into a boxed trait object
    fn clone_box(&self) -> Box<dyn TimeProvider>;
}

/// Production provider. Reads tokio's clock, so a paused test runtime
/// (`start_paused = true`) and the instants reported here always agree.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn clone_box(&self) -> Box<dyn TimeProvider> {
        Box::new(*self)
    }
}

/// Manually advanced clock for tests.
#[derive(Clone, Debug)]
pub struct VirtualTimeProvider {
    instant: Arc<Mutex<Instant>>,
    base_instant: Instant,
    timers: Arc<Mutex<Vec<VirtualTimer>>>,
}

#[derive(Debug)]
struct VirtualTimer {
    deadline: Instant,
    waker: Option<Waker>,
}

impl VirtualTimeProvider {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            instant: Arc::new(Mutex::new(now)),
            base_instant: now,
            timers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Advance time by a duration
    pub fn advance(&self, duration: Duration) {
        let new_instant = {
            let mut instant = self.instant.lock();
            *instant += duration;
            *instant
        };
        self.wake_expired_timers(new_instant);
    }

    /// Time elapsed since the provider was created.
    pub fn elapsed(&self) -> Duration {
        self.now() - self.base_instant
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.lock().len()
    }

    fn wake_expired_timers(&self, now: Instant) {
        let mut timers = self.timers.lock();
        timers.retain_mut(|timer| {
            if timer.deadline <= now {
                if let Some(waker) = timer.waker.take() {
                    waker.wake();
                }
                false
            } else {
                true
            }
        });
    }
}

impl Default for VirtualTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for VirtualTimeProvider {
    fn now(&self) -> Instant {
        *self.instant.lock()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(VirtualSleep {
            deadline: self.now() + duration,
            provider: self.clone(),
            registered: false,
        })
    }

    fn clone_box(&self) -> Box<dyn TimeProvider> {
        Box::new(self.clone())
    }
}

/// Future that completes when virtual time advances past a deadline
struct VirtualSleep {
    provider: VirtualTimeProvider,
    deadline: Instant,
    registered: bool,
}

impl Future for VirtualSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.provider.now() >= self.deadline {
            return Poll::Ready(());
        }
        if !self.registered {
            self.provider.timers.lock().push(VirtualTimer {
                deadline: self.deadline,
                waker: Some(cx.waker().clone()),
            });
            self.registered = true;
        }
        Poll::Pending
    }
}
