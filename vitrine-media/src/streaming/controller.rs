use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use vitrine_config::StreamingConfig;

use super::capping::{QualityCap, compute_cap};
use super::manifest::{HLS_MIME, StreamQualityLevel};
use super::platform::{
    AdaptiveSession, ReadinessSignal, SessionConfig, StreamError, StreamErrorKind, StreamEvent,
    StreamPlatform,
};
use super::watchdog::{RecoveryAction, StallWatchdog, WatchdogObservation};
use crate::mount::MediaMount;
use crate::runtime::MediaRuntime;
use crate::surface::VideoSurface;
use crate::time::TimeProvider;
use crate::visibility::DocumentVisibility;

/// Controller lifecycle.
///
/// `Idle -> Attaching -> Buffering -> Playing`, with `Playing <-> Stalled ->
/// Recovering -> Playing` while running. Any state may drop to `Detached`,
/// which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Attaching,
    Buffering,
    Playing,
    Stalled,
    Recovering,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Host adaptive-streaming session.
    Adaptive,
    /// The element plays the manifest itself.
    Native,
}

enum ErrorStep {
    RestartLoad(Arc<dyn AdaptiveSession>),
    RecoverMedia(Arc<dyn AdaptiveSession>),
    Teardown,
}

struct ControllerState {
    state: StreamState,
    mode: Option<DeliveryMode>,
    session: Option<Arc<dyn AdaptiveSession>>,
    levels: Vec<StreamQualityLevel>,
    cap: Option<QualityCap>,
    watchdog: StallWatchdog,
    foreground: bool,
    network_recoveries: u32,
    media_recoveries: u32,
    watchdog_task: Option<JoinHandle<()>>,
}

/// Drives one background/hero video from an adaptive manifest.
///
/// Host events (session events, element readiness, visibility, network
/// changes) are forwarded into the controller; it never blocks and never
/// surfaces an error to the page. Once fatal faults exhaust their retry
/// budget the controller detaches and the page shows the poster.
pub struct StreamingVideoController {
    mount: MediaMount,
    surface: Arc<dyn VideoSurface>,
    platform: Arc<dyn StreamPlatform>,
    config: StreamingConfig,
    watchdog_interval: Duration,
    time: Arc<dyn TimeProvider>,
    inner: Mutex<ControllerState>,
}

impl fmt::Debug for StreamingVideoController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StreamingVideoController")
            .field("src", &self.mount.src)
            .field("state", &inner.state)
            .field("mode", &inner.mode)
            .field("cap", &inner.cap)
            .finish()
    }
}

impl StreamingVideoController {
    pub fn new(
        runtime: &MediaRuntime,
        surface: Arc<dyn VideoSurface>,
        platform: Arc<dyn StreamPlatform>,
        mount: MediaMount,
    ) -> Arc<Self> {
        let config = runtime.config();
        Arc::new(Self {
            mount,
            surface,
            platform,
            config: config.streaming.clone(),
            watchdog_interval: config.watchdog.interval(),
            time: Arc::clone(runtime.time()),
            inner: Mutex::new(ControllerState {
                state: StreamState::Idle,
                mode: None,
                session: None,
                levels: Vec::new(),
                cap: None,
                watchdog: StallWatchdog::new(&config.watchdog),
                foreground: true,
                network_recoveries: 0,
                media_recoveries: 0,
                watchdog_task: None,
            }),
        })
    }

    pub fn state(&self) -> StreamState {
        self.inner.lock().state
    }

    pub fn mode(&self) -> Option<DeliveryMode> {
        self.inner.lock().mode
    }

    pub fn cap(&self) -> Option<QualityCap> {
        self.inner.lock().cap
    }

    pub fn levels(&self) -> Vec<StreamQualityLevel> {
        self.inner.lock().levels.clone()
    }

    /// Poster to show once detached, if the page supplied one.
    pub fn poster(&self) -> Option<&str> {
        self.mount.poster.as_deref()
    }

    pub fn is_watchdog_running(&self) -> bool {
        self.inner
            .lock()
            .watchdog_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Bind the source to the surface: through an adaptive session when the
    /// platform has one, natively when the element can play the manifest,
    /// otherwise detach straight away. Only the first call has any effect.
    pub fn attach(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock();
            if inner.state != StreamState::Idle {
                log::debug!("attach ignored in state {:?}", inner.state);
                return;
            }
            inner.state = StreamState::Attaching;
        }

        let session = if self.platform.supports_adaptive() {
            self.open_session(None)
        } else {
            None
        };

        let mode = match session {
            Some(session) => {
                let mut inner = self.inner.lock();
                if inner.state == StreamState::Detached {
                    drop(inner);
                    session.destroy();
                    return;
                }
                inner.session = Some(session);
                inner.mode = Some(DeliveryMode::Adaptive);
                DeliveryMode::Adaptive
            }
            None if self.surface.can_play_type(HLS_MIME) => {
                log::debug!("playing {} natively", self.mount.src);
                self.surface.set_src(&self.mount.src);
                let mut inner = self.inner.lock();
                inner.mode = Some(DeliveryMode::Native);
                inner.state = StreamState::Buffering;
                DeliveryMode::Native
            }
            None => {
                log::info!("no playback path for {}; showing poster", self.mount.src);
                self.teardown();
                return;
            }
        };

        self.start_watchdog();
        if mode == DeliveryMode::Native {
            self.try_play();
        }
    }

    /// Forward a session event.
    pub fn handle_event(&self, event: StreamEvent) {
        match event {
            StreamEvent::ManifestParsed { levels } => self.on_manifest(levels),
            StreamEvent::LevelSwitched { level } => {
                log::debug!("{} switched to level {level}", self.mount.src);
            }
            StreamEvent::BufferStalled => self.on_buffer_stalled(),
            StreamEvent::Error(error) => self.on_error(error),
        }
    }

    /// Element started (or resumed) rendering frames.
    pub fn on_playing(&self) {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Detached {
            return;
        }
        inner.state = StreamState::Playing;
        inner.network_recoveries = 0;
        inner.media_recoveries = 0;
    }

    /// Element is waiting for data.
    pub fn on_waiting(&self) {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Playing {
            inner.state = StreamState::Stalled;
        }
    }

    /// A moment where a previously refused autoplay may now succeed.
    pub fn on_readiness(&self, signal: ReadinessSignal) {
        if self.state() == StreamState::Detached {
            return;
        }
        log::trace!("readiness signal {signal:?} for {}", self.mount.src);
        self.try_play();
    }

    pub fn on_document_visibility(&self, visibility: DocumentVisibility) {
        self.inner.lock().foreground = visibility == DocumentVisibility::Visible;
        if visibility == DocumentVisibility::Visible {
            self.on_readiness(ReadinessSignal::BecameVisible);
        }
    }

    /// Re-evaluate the quality cap after the platform reported a network
    /// change.
    pub fn on_network_change(&self) {
        let levels = {
            let inner = self.inner.lock();
            if inner.state == StreamState::Detached || inner.levels.is_empty() {
                return;
            }
            inner.levels.clone()
        };
        self.apply_cap(&levels);
    }

    /// Sample the element once and carry out the recovery step the watchdog
    /// picks. Called by the background watchdog task; public so hosts without
    /// an async runtime can drive it from their own timer.
    pub fn watchdog_tick(&self) -> Option<RecoveryAction> {
        let position = self.surface.current_time();
        let playing = !self.surface.is_paused() && !self.surface.is_ended();
        let seeking = self.surface.is_seeking();
        let now = self.time.now();

        let action = {
            let mut inner = self.inner.lock();
            if inner.state == StreamState::Detached {
                return None;
            }
            let observation = WatchdogObservation {
                playing,
                seeking,
                foreground: inner.foreground,
                position,
            };
            let action = inner.watchdog.observe(observation, now)?;
            inner.state = StreamState::Recovering;
            action
        };

        log::info!(
            "{} stalled at {position:.2}s; recovering with {action:?}",
            self.mount.src
        );
        match action {
            RecoveryAction::Resume => self.force_play(),
            RecoveryAction::Rebind => self.rebind(position),
            RecoveryAction::Nudge { to } => {
                self.surface.set_current_time(to);
                self.force_play();
            }
        }
        Some(action)
    }

    /// Release the session, stop the watchdog and detach. Idempotent.
    pub fn teardown(&self) {
        let (session, task, mode) = {
            let mut inner = self.inner.lock();
            if inner.state == StreamState::Detached {
                return;
            }
            inner.state = StreamState::Detached;
            inner.watchdog.reset();
            (inner.session.take(), inner.watchdog_task.take(), inner.mode.take())
        };

        if let Some(task) = task {
            task.abort();
        }
        if let Some(session) = session {
            session.destroy();
        }
        if mode == Some(DeliveryMode::Native) {
            self.surface.clear_src();
        }
        log::debug!("detached streaming controller for {}", self.mount.src);
    }

    fn on_manifest(&self, levels: Vec<StreamQualityLevel>) {
        {
            let mut inner = self.inner.lock();
            if inner.state == StreamState::Detached {
                return;
            }
            inner.levels = levels.clone();
            if matches!(inner.state, StreamState::Idle | StreamState::Attaching) {
                inner.state = StreamState::Buffering;
            }
        }
        self.apply_cap(&levels);
        self.try_play();
    }

    fn on_buffer_stalled(&self) {
        let session = {
            let mut inner = self.inner.lock();
            if inner.state == StreamState::Detached {
                return;
            }
            inner.state = StreamState::Stalled;
            inner.session.clone()
        };
        let Some(session) = session else {
            return;
        };
        log::debug!("buffer stalled on {}; reloading current segment", self.mount.src);
        session.start_load();

        let mut inner = self.inner.lock();
        if inner.state == StreamState::Stalled {
            inner.state = StreamState::Recovering;
        }
    }

    fn on_error(&self, error: StreamError) {
        if !error.fatal {
            log::debug!(
                "non-fatal {:?} error on {}: {}",
                error.kind,
                self.mount.src,
                error.details
            );
            return;
        }

        let step = {
            let mut inner = self.inner.lock();
            if inner.state == StreamState::Detached {
                return;
            }
            match (error.kind, inner.session.clone()) {
                (StreamErrorKind::Network, Some(session))
                    if inner.network_recoveries < self.config.max_network_recoveries =>
                {
                    inner.network_recoveries += 1;
                    inner.state = StreamState::Recovering;
                    ErrorStep::RestartLoad(session)
                }
                (StreamErrorKind::Media, Some(session))
                    if inner.media_recoveries < self.config.max_media_recoveries =>
                {
                    inner.media_recoveries += 1;
                    inner.state = StreamState::Recovering;
                    ErrorStep::RecoverMedia(session)
                }
                _ => ErrorStep::Teardown,
            }
        };

        match step {
            ErrorStep::RestartLoad(session) => {
                log::warn!(
                    "fatal network error on {}, restarting load: {}",
                    self.mount.src,
                    error.details
                );
                session.start_load();
            }
            ErrorStep::RecoverMedia(session) => {
                log::warn!(
                    "fatal media error on {}, recovering decoder: {}",
                    self.mount.src,
                    error.details
                );
                session.recover_media_error();
            }
            ErrorStep::Teardown => {
                log::warn!(
                    "unrecoverable {:?} error on {}, giving up: {}",
                    error.kind,
                    self.mount.src,
                    error.details
                );
                self.teardown();
            }
        }
    }

    fn apply_cap(&self, levels: &[StreamQualityLevel]) {
        let network = self.platform.network_conditions();
        let device = self.platform.device_profile();
        let cap = compute_cap(levels, &self.config, network.as_ref(), device.as_ref());

        let session = {
            let mut inner = self.inner.lock();
            inner.cap = cap;
            inner.session.clone()
        };
        if let Some(cap) = cap {
            log::debug!(
                "{} capped at level {} ({:?})",
                self.mount.src,
                cap.max_level,
                cap.reason
            );
        }
        if let Some(session) = session {
            session.set_level_cap(cap.map(|cap| cap.max_level));
        }
    }

    fn open_session(&self, level_cap: Option<usize>) -> Option<Arc<dyn AdaptiveSession>> {
        let config = SessionConfig {
            start_level_cap: level_cap,
            ..SessionConfig::from_streaming(&self.config)
        };
        match self.platform.create_session(&config) {
            Ok(session) => {
                session.attach(Arc::clone(&self.surface));
                session.set_level_cap(level_cap);
                session.load_source(&self.mount.src);
                Some(session)
            }
            Err(err) => {
                log::warn!("could not open adaptive session for {}: {err}", self.mount.src);
                None
            }
        }
    }

    /// Replace the session (or reload the native source) and resume at
    /// `position`.
    fn rebind(&self, position: f64) {
        let (previous, mode, cap) = {
            let mut inner = self.inner.lock();
            (inner.session.take(), inner.mode, inner.cap)
        };
        if let Some(previous) = previous {
            previous.destroy();
        }

        match mode {
            Some(DeliveryMode::Adaptive) => {
                let Some(session) = self.open_session(cap.map(|cap| cap.max_level)) else {
                    self.teardown();
                    return;
                };
                let mut inner = self.inner.lock();
                if inner.state == StreamState::Detached {
                    drop(inner);
                    session.destroy();
                    return;
                }
                inner.session = Some(session);
            }
            Some(DeliveryMode::Native) => {
                self.surface.clear_src();
                self.surface.set_src(&self.mount.src);
            }
            None => return,
        }

        self.surface.set_current_time(position);
        self.force_play();
    }

    fn try_play(&self) {
        if self.surface.is_paused() {
            self.force_play();
        }
    }

    fn force_play(&self) {
        if let Err(err) = self.surface.play() {
            log::debug!("autoplay of {} deferred: {err}", self.mount.src);
        }
    }

    fn start_watchdog(self: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!(
                "no async runtime; stall watchdog for {} must be ticked by the host",
                self.mount.src
            );
            return;
        };

        let weak = Arc::downgrade(self);
        let time = Arc::clone(&self.time);
        let interval = self.watchdog_interval;
        let task = handle.spawn(async move {
            loop {
                time.sleep(interval).await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                if controller.state() == StreamState::Detached {
                    break;
                }
                controller.watchdog_tick();
            }
        });

        let previous = self.inner.lock().watchdog_task.replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl Drop for StreamingVideoController {
    fn drop(&mut self) {
        self.teardown();
    }
}
