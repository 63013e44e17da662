//! Per-page context object bundling the shared registries.

use std::fmt;
use std::sync::Arc;

use url::Url;
use vitrine_config::MediaRuntimeConfig;

use crate::coordinator::PlaybackCoordinator;
use crate::error::Result;
use crate::mount::MediaMount;
use crate::peaks::{HttpPeakSource, PeakCache, PeakSource};
use crate::resumable::VisibilityResumableVideo;
use crate::streaming::{StreamPlatform, StreamingVideoController};
use crate::surface::VideoSurface;
use crate::time::{SystemTimeProvider, TimeProvider};
use crate::visibility::{DocumentVisibility, VisibilityBroadcaster};
use crate::waveform::{AudioEngineFactory, WaveformAudioPlayer};

/// Everything the media components on one page share: the playback
/// coordinator, the visibility broadcaster, the peak cache, the clock and
/// the configuration. Cloning is cheap and every clone refers to the same
/// page state.
#[derive(Clone)]
pub struct MediaRuntime {
    config: Arc<MediaRuntimeConfig>,
    coordinator: Arc<PlaybackCoordinator>,
    visibility: Arc<VisibilityBroadcaster>,
    peaks: Arc<PeakCache>,
    time: Arc<dyn TimeProvider>,
}

impl fmt::Debug for MediaRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaRuntime")
            .field("coordinator", &self.coordinator)
            .field("visibility", &self.visibility)
            .field("peaks", &self.peaks)
            .field("time", &"<dyn TimeProvider>")
            .finish()
    }
}

impl MediaRuntime {
    /// Production runtime: peaks are fetched over HTTP from the configured
    /// waveform host and time follows the tokio clock.
    pub fn new(config: MediaRuntimeConfig) -> Result<Self> {
        let base = Url::parse(&config.waveform.base_url)?;
        let source = Arc::new(HttpPeakSource::new(base)?);
        Ok(Self::with_parts(config, source, Arc::new(SystemTimeProvider)))
    }

    pub fn with_parts(
        config: MediaRuntimeConfig,
        peak_source: Arc<dyn PeakSource>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        let peaks = PeakCache::new(peak_source, config.waveform.bins);
        Self {
            config: Arc::new(config),
            coordinator: Arc::new(PlaybackCoordinator::new()),
            visibility: Arc::new(VisibilityBroadcaster::new()),
            peaks: Arc::new(peaks),
            time,
        }
    }

    pub fn config(&self) -> &MediaRuntimeConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<PlaybackCoordinator> {
        &self.coordinator
    }

    pub fn visibility(&self) -> &Arc<VisibilityBroadcaster> {
        &self.visibility
    }

    pub fn peaks(&self) -> &Arc<PeakCache> {
        &self.peaks
    }

    pub fn time(&self) -> &Arc<dyn TimeProvider> {
        &self.time
    }

    /// Forward a platform visibility change to the broadcaster.
    pub fn on_document_visibility(&self, visibility: DocumentVisibility) {
        self.visibility.on_document_visibility(visibility);
    }

    pub fn mount_waveform(
        &self,
        factory: Arc<dyn AudioEngineFactory>,
        mount: MediaMount,
    ) -> Arc<WaveformAudioPlayer> {
        WaveformAudioPlayer::mount(self, factory, mount)
    }

    pub fn stream_controller(
        &self,
        surface: Arc<dyn VideoSurface>,
        platform: Arc<dyn StreamPlatform>,
        mount: MediaMount,
    ) -> Arc<StreamingVideoController> {
        StreamingVideoController::new(self, surface, platform, mount)
    }

    pub fn resumable_video(&self, surface: Arc<dyn VideoSurface>) -> Arc<VisibilityResumableVideo> {
        VisibilityResumableVideo::new(self, surface)
    }

    /// Page teardown: destroy every registered player.
    pub fn shutdown(&self) {
        log::debug!("shutting down media runtime");
        self.coordinator.destroy_all();
    }
}
