use std::sync::Arc;

use crate::error::Result;
use crate::peaks::WaveformPeaks;

/// Heavy audio decode/render engine behind a waveform player. Creating one
/// is expensive, so players defer it until the unit is near the viewport or
/// the user interacts.
pub trait AudioEngine: Send + Sync {
    /// Start playback. `Err(MediaError::PlayRejected)` when the platform
    /// refuses.
    fn play(&self) -> Result<()>;
    fn pause(&self);
    fn seek(&self, seconds: f64);
    fn set_volume(&self, volume: f64);
    /// Duration decoded from the media, once known.
    fn duration(&self) -> Option<f64>;
    fn destroy(&self);
}

pub trait AudioEngineFactory: Send + Sync {
    /// Build an engine for `src`. Precomputed `peaks` let the engine skip
    /// decoding the whole file just to draw.
    fn create(
        &self,
        src: &str,
        peaks: Option<&WaveformPeaks>,
    ) -> Result<Arc<dyn AudioEngine>>;
}
