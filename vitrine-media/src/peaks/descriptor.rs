use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MediaError, Result};

/// Precomputed peak descriptor as published next to the audio file:
/// `{ "peaks": [...], "duration": 123.4 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDescriptor {
    pub peaks: Vec<f64>,
    pub duration: f64,
}

/// Normalized amplitude summary of one audio source. Samples are in `0..=1`,
/// resampled to a fixed bin count, and shared between players through an
/// [`Arc`].
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformPeaks {
    samples: Arc<[f32]>,
    duration: f64,
}

impl WaveformPeaks {
    /// Normalize a raw descriptor into `bins` samples.
    ///
    /// Negative values are folded to their magnitude and non-finite values
    /// count as silence. A descriptor with no peaks or a bad duration is
    /// rejected so the caller can fall back to a plain bar.
    pub fn from_descriptor(descriptor: PeakDescriptor, bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(MediaError::InvalidPeaks("bin count must be positive".into()));
        }
        if descriptor.peaks.is_empty() {
            return Err(MediaError::InvalidPeaks("descriptor has no peaks".into()));
        }
        if !descriptor.duration.is_finite() || descriptor.duration < 0.0 {
            return Err(MediaError::InvalidPeaks(format!(
                "duration {} is not a valid length",
                descriptor.duration
            )));
        }

        let magnitudes: Vec<f32> = descriptor
            .peaks
            .iter()
            .map(|value| if value.is_finite() { value.abs() as f32 } else { 0.0 })
            .collect();
        let loudest = magnitudes.iter().copied().fold(0.0_f32, f32::max);

        let mut samples = max_pool(&magnitudes, bins);
        if loudest > 0.0 {
            for sample in &mut samples {
                *sample /= loudest;
            }
        }

        Ok(Self {
            samples: samples.into(),
            duration: descriptor.duration,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Downsample for narrower layouts, keeping the loudest sample per bar.
    pub fn bars(&self, count: usize) -> Vec<f32> {
        if count >= self.samples.len() {
            return self.samples.to_vec();
        }
        max_pool(&self.samples, count)
    }
}

/// Resample `values` to exactly `count` buckets. Shrinking keeps each
/// bucket's maximum; stretching repeats the nearest sample.
fn max_pool(values: &[f32], count: usize) -> Vec<f32> {
    if values.is_empty() || count == 0 {
        return Vec::new();
    }
    let len = values.len();
    (0..count)
        .map(|bucket| {
            let start = bucket * len / count;
            let end = ((bucket + 1) * len / count).max(start + 1).min(len);
            values[start..end].iter().copied().fold(0.0_f32, f32::max)
        })
        .collect()
}

/// Descriptor location for an audio source: the source's path under `base`,
/// with the file extension swapped for `.json`.
///
/// `https://cdn.example/audio/mix/track1.mp3` under
/// `https://waveforms.example/peaks` resolves to
/// `https://waveforms.example/peaks/audio/mix/track1.json`.
pub fn descriptor_url(base: &Url, audio_src: &str) -> Result<Url> {
    let path = match Url::parse(audio_src) {
        Ok(url) => url.path().to_string(),
        Err(_) => audio_src
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let path = path.trim_start_matches('/');

    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file,
    };
    if stem.is_empty() {
        return Err(MediaError::InvalidPeaks(format!(
            "audio source {audio_src:?} has no file name"
        )));
    }

    let relative = match dir {
        Some(dir) => format!("{dir}/{stem}.json"),
        None => format!("{stem}.json"),
    };

    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(&relative)?)
}
