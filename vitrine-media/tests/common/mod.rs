//! Host fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use vitrine_config::MediaRuntimeConfig;
use vitrine_media::error::{MediaError, Result};
use vitrine_media::peaks::{PeakDescriptor, PeakSource, WaveformPeaks};
use vitrine_media::streaming::{
    AdaptiveSession, DeviceProfile, NetworkConditions, SessionConfig, StreamPlatform,
};
use vitrine_media::surface::VideoSurface;
use vitrine_media::waveform::{AudioEngine, AudioEngineFactory};
use vitrine_media::{MediaRuntime, TimeProvider, VirtualTimeProvider};

pub fn runtime(source: Arc<dyn PeakSource>) -> (MediaRuntime, VirtualTimeProvider) {
    runtime_with_config(MediaRuntimeConfig::default(), source)
}

pub fn runtime_with_config(
    config: MediaRuntimeConfig,
    source: Arc<dyn PeakSource>,
) -> (MediaRuntime, VirtualTimeProvider) {
    let time = VirtualTimeProvider::new();
    let runtime = MediaRuntime::with_parts(config, source, Arc::new(time.clone()));
    (runtime, time)
}

pub fn tokio_clock_runtime(source: Arc<dyn PeakSource>) -> MediaRuntime {
    let time: Arc<dyn TimeProvider> = Arc::new(vitrine_media::SystemTimeProvider);
    MediaRuntime::with_parts(MediaRuntimeConfig::default(), source, time)
}

// ---------------------------------------------------------------------------
// Peaks

/// Serves descriptors from a map and counts fetches. Every fetch yields to
/// the scheduler first so concurrent loads really overlap.
#[derive(Default)]
pub struct CountingPeakSource {
    descriptors: HashMap<String, PeakDescriptor>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingPeakSource {
    pub fn with(entries: &[(&str, Vec<f64>, f64)]) -> Arc<Self> {
        let descriptors = entries
            .iter()
            .map(|(src, peaks, duration)| {
                (
                    src.to_string(),
                    PeakDescriptor {
                        peaks: peaks.clone(),
                        duration: *duration,
                    },
                )
            })
            .collect();
        Arc::new(Self {
            descriptors,
            ..Self::default()
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PeakSource for CountingPeakSource {
    async fn fetch(&self, audio_src: &str) -> Result<Option<PeakDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::PeakFetch("connection reset".into()));
        }
        Ok(self.descriptors.get(audio_src).cloned())
    }
}

pub fn peaks_of(peaks: &WaveformPeaks) -> Vec<f32> {
    peaks.samples().to_vec()
}

// ---------------------------------------------------------------------------
// Audio engines

/// Engine calls, tagged with the engine's creation index, in global order.
pub type EngineLog = Arc<Mutex<Vec<(usize, EngineCall)>>>;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Play,
    Pause,
    Seek(f64),
    Volume(f64),
    Destroy,
}

pub struct FakeEngine {
    index: usize,
    log: EngineLog,
    duration: Option<f64>,
    reject_play: AtomicBool,
}

impl FakeEngine {
    pub fn reject_play(&self, reject: bool) {
        self.reject_play.store(reject, Ordering::SeqCst);
    }

    fn record(&self, call: EngineCall) {
        self.log.lock().push((self.index, call));
    }
}

impl AudioEngine for FakeEngine {
    fn play(&self) -> Result<()> {
        if self.reject_play.load(Ordering::SeqCst) {
            return Err(MediaError::PlayRejected("NotAllowedError".into()));
        }
        self.record(EngineCall::Play);
        Ok(())
    }

    fn pause(&self) {
        self.record(EngineCall::Pause);
    }

    fn seek(&self, seconds: f64) {
        self.record(EngineCall::Seek(seconds));
    }

    fn set_volume(&self, volume: f64) {
        self.record(EngineCall::Volume(volume));
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn destroy(&self) {
        self.record(EngineCall::Destroy);
    }
}

pub struct FakeEngineFactory {
    pub log: EngineLog,
    duration: Option<f64>,
    engines: Mutex<Vec<Arc<FakeEngine>>>,
    created_with_peaks: Mutex<Vec<bool>>,
}

impl FakeEngineFactory {
    pub fn new(duration: Option<f64>) -> Arc<Self> {
        Arc::new(Self {
            log: Arc::default(),
            duration,
            engines: Mutex::default(),
            created_with_peaks: Mutex::default(),
        })
    }

    pub fn created(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn engine(&self, index: usize) -> Arc<FakeEngine> {
        Arc::clone(&self.engines.lock()[index])
    }

    pub fn created_with_peaks(&self) -> Vec<bool> {
        self.created_with_peaks.lock().clone()
    }

    pub fn calls(&self) -> Vec<(usize, EngineCall)> {
        self.log.lock().clone()
    }

    pub fn calls_for(&self, index: usize) -> Vec<EngineCall> {
        self.log
            .lock()
            .iter()
            .filter(|(engine, _)| *engine == index)
            .map(|(_, call)| call.clone())
            .collect()
    }
}

impl AudioEngineFactory for FakeEngineFactory {
    fn create(
        &self,
        _src: &str,
        peaks: Option<&WaveformPeaks>,
    ) -> Result<Arc<dyn AudioEngine>> {
        let mut engines = self.engines.lock();
        let engine = Arc::new(FakeEngine {
            index: engines.len(),
            log: Arc::clone(&self.log),
            duration: self.duration,
            reject_play: AtomicBool::new(false),
        });
        engines.push(Arc::clone(&engine));
        self.created_with_peaks.lock().push(peaks.is_some());
        Ok(engine)
    }
}

// ---------------------------------------------------------------------------
// Video surfaces

#[derive(Debug, Default, Clone)]
pub struct SurfaceState {
    pub paused: bool,
    pub ended: bool,
    pub seeking: bool,
    pub looping: bool,
    pub position: f64,
    pub duration: Option<f64>,
    pub reject_play: bool,
    pub native_hls: bool,
    pub src: Option<String>,
    pub play_calls: usize,
    pub seeks: Vec<f64>,
    pub clears: usize,
}

pub struct FakeSurface {
    state: Mutex<SurfaceState>,
}

impl FakeSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SurfaceState {
                paused: true,
                ..SurfaceState::default()
            }),
        })
    }

    pub fn update(&self, f: impl FnOnce(&mut SurfaceState)) {
        f(&mut self.state.lock());
    }

    pub fn snapshot(&self) -> SurfaceState {
        self.state.lock().clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().play_calls
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().seeks.clone()
    }
}

impl VideoSurface for FakeSurface {
    fn play(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.play_calls += 1;
        if state.reject_play {
            return Err(MediaError::PlayRejected("NotAllowedError".into()));
        }
        state.paused = false;
        state.ended = false;
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn set_current_time(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.position = seconds;
        state.seeks.push(seconds);
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn is_seeking(&self) -> bool {
        self.state.lock().seeking
    }

    fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    fn set_src(&self, url: &str) {
        self.state.lock().src = Some(url.to_string());
    }

    fn clear_src(&self) {
        let mut state = self.state.lock();
        state.src = None;
        state.clears += 1;
    }

    fn can_play_type(&self, mime: &str) -> bool {
        self.state.lock().native_hls && mime == vitrine_media::streaming::HLS_MIME
    }
}

// ---------------------------------------------------------------------------
// Adaptive sessions

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Attach,
    Load(String),
    StartLoad,
    RecoverMedia,
    LevelCap(Option<usize>),
    Destroy,
}

#[derive(Default)]
pub struct FakeSession {
    calls: Mutex<Vec<SessionCall>>,
}

impl FakeSession {
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &SessionCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn last_level_cap(&self) -> Option<Option<usize>> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            SessionCall::LevelCap(cap) => Some(*cap),
            _ => None,
        })
    }
}

impl AdaptiveSession for FakeSession {
    fn attach(&self, _surface: Arc<dyn VideoSurface>) {
        self.calls.lock().push(SessionCall::Attach);
    }

    fn load_source(&self, url: &str) {
        self.calls.lock().push(SessionCall::Load(url.to_string()));
    }

    fn start_load(&self) {
        self.calls.lock().push(SessionCall::StartLoad);
    }

    fn recover_media_error(&self) {
        self.calls.lock().push(SessionCall::RecoverMedia);
    }

    fn set_level_cap(&self, cap: Option<usize>) {
        self.calls.lock().push(SessionCall::LevelCap(cap));
    }

    fn destroy(&self) {
        self.calls.lock().push(SessionCall::Destroy);
    }
}

pub struct FakePlatform {
    adaptive: bool,
    fail_create: bool,
    network: Mutex<Option<NetworkConditions>>,
    device: Option<DeviceProfile>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakePlatform {
    pub fn adaptive(network: Option<NetworkConditions>) -> Arc<Self> {
        Arc::new(Self {
            adaptive: true,
            fail_create: false,
            network: Mutex::new(network),
            device: None,
            sessions: Mutex::default(),
        })
    }

    /// Claims adaptive support but every session fails to open.
    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            adaptive: true,
            fail_create: true,
            network: Mutex::new(None),
            device: None,
            sessions: Mutex::default(),
        })
    }

    pub fn without_adaptive() -> Arc<Self> {
        Arc::new(Self {
            adaptive: false,
            fail_create: false,
            network: Mutex::new(None),
            device: None,
            sessions: Mutex::default(),
        })
    }

    pub fn set_network(&self, network: Option<NetworkConditions>) {
        *self.network.lock() = network;
    }

    pub fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.sessions.lock().clone()
    }

    pub fn session(&self, index: usize) -> Arc<FakeSession> {
        Arc::clone(&self.sessions.lock()[index])
    }
}

impl StreamPlatform for FakePlatform {
    fn supports_adaptive(&self) -> bool {
        self.adaptive
    }

    fn create_session(&self, _config: &SessionConfig) -> Result<Arc<dyn AdaptiveSession>> {
        if self.fail_create {
            return Err(MediaError::Session("engine unavailable".into()));
        }
        let session = Arc::new(FakeSession::default());
        self.sessions.lock().push(Arc::clone(&session));
        Ok(session)
    }

    fn network_conditions(&self) -> Option<NetworkConditions> {
        *self.network.lock()
    }

    fn device_profile(&self) -> Option<DeviceProfile> {
        self.device
    }
}
