//! Lazily initialized waveform audio player.

mod engine;
mod player;
mod progress;

pub use engine::{AudioEngine, AudioEngineFactory};
pub use player::{EngineState, WaveformAudioPlayer, WaveformShape, WaveformView};
pub use progress::{ProgressThrottle, ProgressUpdate};
