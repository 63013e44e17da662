use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::engine::{AudioEngine, AudioEngineFactory};
use super::progress::{ProgressThrottle, ProgressUpdate};
use crate::coordinator::{PlaybackCoordinator, PlaybackHandle};
use crate::ids::PlayerId;
use crate::mount::MediaMount;
use crate::peaks::{PeakCache, PeakLookup, WaveformPeaks};
use crate::runtime::MediaRuntime;
use crate::time::TimeProvider;
use crate::visibility::AnimationGate;

/// Lifecycle of the heavy audio engine behind a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not created yet; the player shows a lightweight placeholder.
    Dormant,
    /// Created, waiting for the host to report readiness.
    Loading,
    Ready,
    /// Unmounted. Every entry point is a no-op from here on.
    Released,
}

#[derive(Debug, Clone)]
enum PeakState {
    Pending,
    Ready(Arc<WaveformPeaks>),
    Absent,
}

impl PeakState {
    fn from_lookup(lookup: PeakLookup) -> Self {
        match lookup {
            PeakLookup::Ready(peaks) => PeakState::Ready(peaks),
            PeakLookup::Absent => PeakState::Absent,
            PeakLookup::Unknown | PeakLookup::Pending => PeakState::Pending,
        }
    }

    fn ready(&self) -> Option<Arc<WaveformPeaks>> {
        match self {
            PeakState::Ready(peaks) => Some(Arc::clone(peaks)),
            _ => None,
        }
    }
}

/// What the page should draw for a player right now.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformView {
    pub shape: WaveformShape,
    /// Played fraction in `0..=1`, once the duration is known.
    pub progress: Option<f64>,
    pub duration: Option<f64>,
    pub playing: bool,
    pub engine: EngineState,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaveformShape {
    Bars(Arc<WaveformPeaks>),
    /// Plain progress bar. `pending` is set while peaks may still arrive.
    Fallback { pending: bool },
}

struct PlayerState {
    engine: Option<Arc<dyn AudioEngine>>,
    engine_state: EngineState,
    peaks: PeakState,
    duration: Option<f64>,
    position: f64,
    playing: bool,
    play_intent: bool,
    volume: f64,
    throttle: ProgressThrottle,
    gate: Option<AnimationGate>,
    peak_task: Option<JoinHandle<()>>,
}

/// Mountable audio unit with a waveform, registered with the page's
/// [`PlaybackCoordinator`].
///
/// The player is cheap until it is needed: the engine is created when the
/// unit nears the viewport or the user interacts with it, and a play request
/// made before the engine is ready is remembered and honoured once it is.
pub struct WaveformAudioPlayer {
    id: PlayerId,
    mount: MediaMount,
    coordinator: Arc<PlaybackCoordinator>,
    peak_cache: Arc<PeakCache>,
    factory: Arc<dyn AudioEngineFactory>,
    time: Arc<dyn TimeProvider>,
    state: Mutex<PlayerState>,
}

impl fmt::Debug for WaveformAudioPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WaveformAudioPlayer")
            .field("id", &self.id)
            .field("src", &self.mount.src)
            .field("engine", &state.engine_state)
            .field("playing", &state.playing)
            .finish()
    }
}

impl WaveformAudioPlayer {
    /// Mount a player and register it with the runtime's coordinator. Cached
    /// peaks are picked up synchronously; otherwise a background fetch is
    /// started when called inside a tokio runtime.
    pub fn mount(
        runtime: &MediaRuntime,
        factory: Arc<dyn AudioEngineFactory>,
        mount: MediaMount,
    ) -> Arc<Self> {
        let config = &runtime.config().waveform;
        let peaks = PeakState::from_lookup(runtime.peaks().lookup(&mount.src));
        let duration = peaks.ready().map(|peaks| peaks.duration()).filter(|d| *d > 0.0);

        let player = Arc::new(Self {
            id: PlayerId::new(),
            coordinator: Arc::clone(runtime.coordinator()),
            peak_cache: Arc::clone(runtime.peaks()),
            factory,
            time: Arc::clone(runtime.time()),
            state: Mutex::new(PlayerState {
                engine: None,
                engine_state: EngineState::Dormant,
                peaks,
                duration,
                position: 0.0,
                playing: false,
                play_intent: false,
                volume: config.default_volume,
                throttle: ProgressThrottle::new(config.progress_interval()),
                gate: Some(AnimationGate::new(runtime.visibility())),
                peak_task: None,
            }),
            mount,
        });

        player.coordinator.register(player.id, &player);
        log::debug!("mounted waveform player {} for {}", player.id, player.mount.src);

        if matches!(player.state.lock().peaks, PeakState::Pending) {
            player.spawn_peak_load();
        }
        player
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn mount_info(&self) -> &MediaMount {
        &self.mount
    }

    pub fn engine_state(&self) -> EngineState {
        self.state.lock().engine_state
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// Whether a play request is waiting for the engine.
    pub fn has_pending_play(&self) -> bool {
        self.state.lock().play_intent
    }

    pub fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    pub fn position(&self) -> f64 {
        self.state.lock().position
    }

    pub fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    /// Resolve peaks through the shared cache and adopt them. Concurrent
    /// players with the same source share one fetch.
    pub async fn load_peaks(&self) -> Option<Arc<WaveformPeaks>> {
        if let Some(peaks) = self.state.lock().peaks.ready() {
            return Some(peaks);
        }

        let peaks = self.peak_cache.load(&self.mount.src).await;
        self.adopt_peaks(peaks.as_ref());
        peaks
    }

    fn adopt_peaks(&self, peaks: Option<&Arc<WaveformPeaks>>) {
        let mut state = self.state.lock();
        if state.engine_state == EngineState::Released {
            return;
        }
        match peaks {
            Some(ready) => {
                if state.duration.is_none() && ready.duration() > 0.0 {
                    state.duration = Some(ready.duration());
                }
                state.peaks = PeakState::Ready(Arc::clone(ready));
            }
            None => state.peaks = PeakState::Absent,
        }
    }

    fn spawn_peak_load(self: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!(
                "no async runtime; peaks for {} load on demand",
                self.mount.src
            );
            return;
        };
        // The fetch must not keep an unmounted player alive.
        let weak = Arc::downgrade(self);
        let cache = Arc::clone(&self.peak_cache);
        let src = self.mount.src.clone();
        let task = handle.spawn(async move {
            let peaks = cache.load(&src).await;
            if let Some(player) = weak.upgrade() {
                player.adopt_peaks(peaks.as_ref());
            }
        });
        self.state.lock().peak_task = Some(task);
    }

    /// The unit scrolled within the pre-roll margin.
    pub fn on_viewport_entered(&self) {
        self.ensure_engine();
    }

    /// Pointer or keyboard focus reached the unit.
    pub fn on_interaction(&self) {
        self.ensure_engine();
    }

    /// Host callback once the engine can play. Adopts the engine's duration
    /// and honours a play request made while loading.
    pub fn on_engine_ready(&self) {
        let (engine, resume) = {
            let mut state = self.state.lock();
            let Some(engine) = state.engine.clone() else {
                return;
            };
            if state.engine_state == EngineState::Released {
                return;
            }
            state.engine_state = EngineState::Ready;
            (engine, std::mem::take(&mut state.play_intent))
        };

        if let Some(duration) = engine.duration().filter(|d| d.is_finite() && *d > 0.0) {
            self.state.lock().duration = Some(duration);
        }
        if resume {
            self.start(engine);
        }
    }

    pub fn play(&self) {
        let Some(engine) = self.ensure_engine() else {
            return;
        };
        {
            let mut state = self.state.lock();
            if state.engine_state != EngineState::Ready {
                state.play_intent = true;
                log::debug!("player {} will start once its engine is ready", self.id);
                return;
            }
        }
        self.start(engine);
    }

    /// User-initiated pause.
    pub fn pause(&self) {
        self.halt();
        self.coordinator.deactivate(self.id);
    }

    pub fn toggle(&self) {
        let running = {
            let state = self.state.lock();
            state.playing || state.play_intent
        };
        if running { self.pause() } else { self.play() }
    }

    /// Seek to `fraction` of the duration. Ignored until the duration is
    /// known.
    pub fn seek_fraction(&self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        let Some(engine) = self.ensure_engine() else {
            return;
        };
        let target = {
            let mut state = self.state.lock();
            let Some(duration) = state.duration else {
                return;
            };
            state.position = fraction.clamp(0.0, 1.0) * duration;
            state.throttle.reset();
            state.position
        };
        engine.seek(target);
    }

    /// Set volume, clamped to `0..=1`.
    pub fn set_volume(&self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        let engine = {
            let mut state = self.state.lock();
            state.volume = volume;
            state.engine.clone()
        };
        if let Some(engine) = engine {
            engine.set_volume(volume);
        }
    }

    /// Host callback for engine position changes. Returns an update for the
    /// page at most once per progress interval, and never while the page's
    /// visibility state is paused.
    pub fn on_time_update(&self, position: f64) -> Option<ProgressUpdate> {
        let now = self.time.now();
        let mut state = self.state.lock();
        if state.engine_state == EngineState::Released {
            return None;
        }
        state.position = position;
        if !state.gate.as_ref().is_some_and(AnimationGate::is_running) {
            return None;
        }
        if !state.throttle.admit(now) {
            return None;
        }
        Some(ProgressUpdate {
            position,
            duration: state.duration,
        })
    }

    /// Host callback when playback reaches the end. Always returns the final
    /// update so the page can draw a full bar.
    pub fn on_ended(&self) -> ProgressUpdate {
        let update = {
            let mut state = self.state.lock();
            state.playing = false;
            state.play_intent = false;
            if let Some(duration) = state.duration {
                state.position = duration;
            }
            state.throttle.reset();
            ProgressUpdate {
                position: state.position,
                duration: state.duration,
            }
        };
        self.coordinator.deactivate(self.id);
        update
    }

    pub fn render(&self) -> WaveformView {
        let state = self.state.lock();
        let shape = match &state.peaks {
            PeakState::Ready(peaks) => WaveformShape::Bars(Arc::clone(peaks)),
            PeakState::Pending => WaveformShape::Fallback { pending: true },
            PeakState::Absent => WaveformShape::Fallback { pending: false },
        };
        let update = ProgressUpdate {
            position: state.position,
            duration: state.duration,
        };
        WaveformView {
            shape,
            progress: update.fraction(),
            duration: state.duration,
            playing: state.playing,
            engine: state.engine_state,
            volume: state.volume,
        }
    }

    /// Tear the player down: unregister, destroy the engine, drop any pending
    /// play request and stop listening for visibility changes. Idempotent.
    pub fn unmount(&self) {
        let (engine, task, gate) = {
            let mut state = self.state.lock();
            if state.engine_state == EngineState::Released {
                return;
            }
            state.engine_state = EngineState::Released;
            state.playing = false;
            state.play_intent = false;
            (state.engine.take(), state.peak_task.take(), state.gate.take())
        };

        self.coordinator.unregister(self.id);
        if let Some(task) = task {
            task.abort();
        }
        drop(gate);
        if let Some(engine) = engine {
            engine.destroy();
        }
        log::debug!("unmounted waveform player {}", self.id);
    }

    fn ensure_engine(&self) -> Option<Arc<dyn AudioEngine>> {
        let peaks = {
            let state = self.state.lock();
            if state.engine_state == EngineState::Released {
                return None;
            }
            if let Some(engine) = &state.engine {
                return Some(Arc::clone(engine));
            }
            state.peaks.ready()
        };

        let engine = match self.factory.create(&self.mount.src, peaks.as_deref()) {
            Ok(engine) => engine,
            Err(err) => {
                log::warn!("audio engine for {} unavailable: {err}", self.mount.src);
                return None;
            }
        };

        let volume = {
            let mut state = self.state.lock();
            if state.engine_state == EngineState::Released || state.engine.is_some() {
                let existing = state.engine.clone();
                drop(state);
                engine.destroy();
                return existing;
            }
            state.engine = Some(Arc::clone(&engine));
            state.engine_state = EngineState::Loading;
            state.volume
        };
        engine.set_volume(volume);
        log::debug!("created audio engine for player {}", self.id);
        Some(engine)
    }

    fn start(&self, engine: Arc<dyn AudioEngine>) {
        // Pauses whichever player was audible before this one.
        if !self.coordinator.set_active(self.id) {
            log::debug!("player {} is not registered; not starting", self.id);
            return;
        }
        match engine.play() {
            Ok(()) => self.state.lock().playing = true,
            Err(err) => {
                log::debug!("playback of {} rejected: {err}", self.mount.src);
                self.coordinator.deactivate(self.id);
            }
        }
    }

    fn halt(&self) {
        let engine = {
            let mut state = self.state.lock();
            state.play_intent = false;
            state.playing = false;
            state.engine.clone()
        };
        if let Some(engine) = engine {
            engine.pause();
        }
    }
}

impl PlaybackHandle for WaveformAudioPlayer {
    fn pause(&self) -> anyhow::Result<()> {
        self.halt();
        Ok(())
    }

    fn destroy(&self) -> anyhow::Result<()> {
        self.unmount();
        Ok(())
    }
}

impl Drop for WaveformAudioPlayer {
    fn drop(&mut self) {
        self.unmount();
    }
}
