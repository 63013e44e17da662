use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::memo::HiddenPlaybackMemo;
use crate::runtime::MediaRuntime;
use crate::surface::VideoSurface;
use crate::time::TimeProvider;
use crate::visibility::DocumentVisibility;

#[derive(Default)]
struct ResumeState {
    hidden: bool,
    was_playing: bool,
    memo: Option<HiddenPlaybackMemo>,
    retry_task: Option<JoinHandle<()>>,
    torn_down: bool,
}

/// Keeps an ambient loop in step with wall-clock time across background
/// tabs.
///
/// When the platform suspends the video while the tab is hidden, the
/// position at hide time is remembered and playback is retried on an
/// interval. When the tab becomes visible again the video is seeked to where
/// it would have been had it never stopped, then resumed. A pause or end the
/// user can see forgets the memo, so deliberate stops stay stopped.
pub struct VisibilityResumableVideo {
    surface: Arc<dyn VideoSurface>,
    time: Arc<dyn TimeProvider>,
    retry_interval: Duration,
    inner: Mutex<ResumeState>,
}

impl fmt::Debug for VisibilityResumableVideo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("VisibilityResumableVideo")
            .field("hidden", &inner.hidden)
            .field("memo", &inner.memo)
            .field("torn_down", &inner.torn_down)
            .finish()
    }
}

impl VisibilityResumableVideo {
    pub fn new(runtime: &MediaRuntime, surface: Arc<dyn VideoSurface>) -> Arc<Self> {
        Arc::new(Self {
            surface,
            time: Arc::clone(runtime.time()),
            retry_interval: runtime.config().resume.retry_interval(),
            inner: Mutex::new(ResumeState::default()),
        })
    }

    pub fn memo(&self) -> Option<HiddenPlaybackMemo> {
        self.inner.lock().memo
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.lock().hidden
    }

    /// Whether playback is being retried in the background.
    pub fn is_retrying(&self) -> bool {
        self.inner
            .lock()
            .retry_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Element `playing` event.
    pub fn on_playing(&self) {
        let task = {
            let mut inner = self.inner.lock();
            if inner.torn_down {
                return;
            }
            inner.was_playing = true;
            if !inner.hidden {
                return;
            }
            // Running again in the background; a later suspension records a
            // fresh memo.
            inner.memo = None;
            inner.retry_task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
    }

    /// Element `pause` event. While hidden after playing this is the platform
    /// suspending the video; otherwise it is a deliberate pause.
    pub fn on_pause(self: &Arc<Self>) {
        let position = self.surface.current_time();
        let now = self.time.now();

        let suspended = {
            let mut inner = self.inner.lock();
            if inner.torn_down {
                return;
            }
            if inner.hidden && inner.was_playing {
                if inner.memo.is_none() {
                    inner.memo = Some(HiddenPlaybackMemo::new(now, position));
                }
                true
            } else {
                inner.memo = None;
                inner.was_playing = false;
                false
            }
        };

        if suspended {
            log::debug!("video suspended while hidden at {position:.2}s; retrying");
            self.start_retry_loop();
        } else {
            self.stop_retry_loop();
        }
    }

    /// Element `ended` event.
    pub fn on_ended(&self) {
        {
            let mut inner = self.inner.lock();
            inner.memo = None;
            inner.was_playing = false;
        }
        self.stop_retry_loop();
    }

    /// Platform visibility change. Returns the position the video was moved
    /// to when it had to be caught up.
    pub fn on_document_visibility(&self, visibility: DocumentVisibility) -> Option<f64> {
        match visibility {
            DocumentVisibility::Hidden => {
                self.on_hidden();
                None
            }
            DocumentVisibility::Visible => self.on_visible(),
        }
    }

    /// One background retry. Returns whether a play attempt was made.
    pub fn retry_tick(&self) -> bool {
        if !self.is_awaiting_resume() || !self.surface.is_paused() {
            return false;
        }
        if let Err(err) = self.surface.play() {
            log::debug!("background resume refused: {err}");
        }
        true
    }

    /// Stop retrying and forget any memo. Idempotent.
    pub fn teardown(&self) {
        let task = {
            let mut inner = self.inner.lock();
            inner.torn_down = true;
            inner.memo = None;
            inner.retry_task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
    }

    fn on_hidden(&self) {
        let playing = !self.surface.is_paused() && !self.surface.is_ended();
        let position = self.surface.current_time();
        let now = self.time.now();

        let mut inner = self.inner.lock();
        if inner.torn_down {
            return;
        }
        inner.hidden = true;
        if playing {
            inner.was_playing = true;
            if inner.memo.is_none() {
                inner.memo = Some(HiddenPlaybackMemo::new(now, position));
            }
        }
    }

    fn on_visible(&self) -> Option<f64> {
        let (memo, task) = {
            let mut inner = self.inner.lock();
            if inner.torn_down {
                return None;
            }
            inner.hidden = false;
            (inner.memo.take(), inner.retry_task.take())
        };
        if let Some(task) = task {
            task.abort();
        }

        let memo = memo?;
        if !self.surface.is_paused() {
            // Kept running while hidden; nothing to catch up.
            return None;
        }

        let duration = self
            .surface
            .duration()
            .filter(|duration| duration.is_finite() && *duration > 0.0);
        let looping = self.surface.is_looping();
        let target = memo.target_position(self.time.now(), duration, looping);
        log::debug!(
            "catching up hidden video from {:.2}s to {target:.2}s",
            memo.position
        );
        self.surface.set_current_time(target);

        if !looping && duration.is_some_and(|duration| target >= duration) {
            // Would have ended while hidden; leave it stopped at the end.
            self.inner.lock().was_playing = false;
            return Some(target);
        }
        if let Err(err) = self.surface.play() {
            log::debug!("resume after visibility change refused: {err}");
        }
        Some(target)
    }

    fn is_awaiting_resume(&self) -> bool {
        let inner = self.inner.lock();
        !inner.torn_down && inner.hidden && inner.memo.is_some()
    }

    fn start_retry_loop(self: &Arc<Self>) {
        if self.is_retrying() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!("no async runtime; hidden resume relies on visibility events");
            return;
        };

        let weak = Arc::downgrade(self);
        let time = Arc::clone(&self.time);
        let interval = self.retry_interval;
        let task = handle.spawn(async move {
            loop {
                time.sleep(interval).await;
                let Some(video) = weak.upgrade() else {
                    break;
                };
                if !video.is_awaiting_resume() {
                    break;
                }
                video.retry_tick();
            }
        });

        let previous = self.inner.lock().retry_task.replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_retry_loop(&self) {
        let task = self.inner.lock().retry_task.take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for VisibilityResumableVideo {
    fn drop(&mut self) {
        self.teardown();
    }
}
