//! Waveform peak data: descriptor decoding, normalization and the
//! process-wide cache shared by every player on the page.

mod cache;
mod descriptor;
mod source;

pub use cache::{PeakCache, PeakLookup};
pub use descriptor::{PeakDescriptor, WaveformPeaks, descriptor_url};
pub use source::{HttpPeakSource, PeakSource};
