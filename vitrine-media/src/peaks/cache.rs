use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use super::descriptor::WaveformPeaks;
use super::source::PeakSource;
use crate::error::{MediaError, Result};

/// Resolved slot: `Some` when peaks exist, `None` when the source has no
/// usable descriptor.
type Slot = Arc<OnceCell<Option<Arc<WaveformPeaks>>>>;

/// Synchronous view of a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PeakLookup {
    /// Never requested.
    Unknown,
    /// Requested but unresolved: a fetch is in flight or the last attempt
    /// failed in transport.
    Pending,
    Ready(Arc<WaveformPeaks>),
    /// Resolved without peaks; render the fallback bar.
    Absent,
}

/// Page-session cache of normalized peaks keyed by audio source.
///
/// Entries are never invalidated. Concurrent loads of the same source share a
/// single fetch: the first caller runs it and everyone else awaits the same
/// cell. Transport failures leave the entry unresolved so a later mount can
/// try again; a missing or malformed descriptor is remembered as absent.
pub struct PeakCache {
    entries: DashMap<String, Slot>,
    source: Arc<dyn PeakSource>,
    bins: usize,
}

impl fmt::Debug for PeakCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeakCache")
            .field("entries", &self.entries.len())
            .field("bins", &self.bins)
            .finish()
    }
}

impl PeakCache {
    pub fn new(source: Arc<dyn PeakSource>, bins: usize) -> Self {
        Self {
            entries: DashMap::new(),
            source,
            bins,
        }
    }

    pub fn lookup(&self, audio_src: &str) -> PeakLookup {
        let Some(slot) = self.entries.get(audio_src) else {
            return PeakLookup::Unknown;
        };
        match slot.get() {
            None => PeakLookup::Pending,
            Some(Some(peaks)) => PeakLookup::Ready(Arc::clone(peaks)),
            Some(None) => PeakLookup::Absent,
        }
    }

    /// Cached peaks without touching the network.
    pub fn cached(&self, audio_src: &str) -> Option<Arc<WaveformPeaks>> {
        match self.lookup(audio_src) {
            PeakLookup::Ready(peaks) => Some(peaks),
            _ => None,
        }
    }

    /// Return peaks for `audio_src`, fetching and normalizing them on first
    /// use. `None` means "render the fallback"; it is never an error.
    pub async fn load(&self, audio_src: &str) -> Option<Arc<WaveformPeaks>> {
        let slot: Slot = Arc::clone(&*self.entries.entry(audio_src.to_string()).or_default());

        match slot.get_or_try_init(|| self.resolve(audio_src)).await {
            Ok(peaks) => peaks.clone(),
            Err(err) => {
                log::debug!("peak fetch for {audio_src} failed, using fallback: {err}");
                None
            }
        }
    }

    async fn resolve(&self, audio_src: &str) -> Result<Option<Arc<WaveformPeaks>>> {
        let descriptor = match self.source.fetch(audio_src).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return Ok(None),
            Err(MediaError::Serialization(err)) => {
                log::warn!("peak descriptor for {audio_src} is not valid json: {err}");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        match WaveformPeaks::from_descriptor(descriptor, self.bins) {
            Ok(peaks) => {
                log::debug!("cached {} peak bins for {audio_src}", peaks.len());
                Ok(Some(Arc::new(peaks)))
            }
            Err(err) => {
                log::warn!("discarding peak descriptor for {audio_src}: {err}");
                Ok(None)
            }
        }
    }

    /// Store peaks computed elsewhere (server-rendered markup, a previous
    /// session). Ignored when the source already resolved.
    pub fn insert(&self, audio_src: &str, peaks: WaveformPeaks) -> bool {
        let slot: Slot = Arc::clone(&*self.entries.entry(audio_src.to_string()).or_default());
        slot.set(Some(Arc::new(peaks))).is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peaks::PeakDescriptor;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl PeakSource for Scripted {
        async fn fetch(&self, audio_src: &str) -> Result<Option<PeakDescriptor>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(MediaError::PeakFetch("connection reset".into()));
            }
            if audio_src == "missing" {
                return Ok(None);
            }
            if audio_src == "garbled" {
                return Err(serde_json::from_str::<PeakDescriptor>("{").unwrap_err().into());
            }
            Ok(Some(PeakDescriptor {
                peaks: vec![0.5, 1.0],
                duration: 30.0,
            }))
        }
    }

    fn cache(fail_first: bool) -> (PeakCache, Arc<Scripted>) {
        let source = Arc::new(Scripted {
            calls: AtomicUsize::new(0),
            fail_first,
        });
        (PeakCache::new(source.clone(), 4), source)
    }

    #[tokio::test]
    async fn absent_descriptor_is_remembered() {
        let (cache, source) = cache(false);

        assert!(cache.load("missing").await.is_none());
        assert!(cache.load("missing").await.is_none());

        assert_eq!(cache.lookup("missing"), PeakLookup::Absent);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_descriptor_is_remembered_as_absent() {
        let (cache, source) = cache(false);

        assert!(cache.load("garbled").await.is_none());
        assert!(cache.load("garbled").await.is_none());

        assert_eq!(cache.lookup("garbled"), PeakLookup::Absent);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_retried_on_next_load() {
        let (cache, source) = cache(true);

        assert!(cache.load("track1").await.is_none());
        assert_eq!(cache.lookup("track1"), PeakLookup::Pending);

        let peaks = cache.load("track1").await.expect("second attempt succeeds");
        assert_eq!(peaks.len(), 4);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inserted_peaks_skip_the_fetch() {
        let (cache, source) = cache(false);
        let peaks = WaveformPeaks::from_descriptor(
            PeakDescriptor {
                peaks: vec![1.0],
                duration: 5.0,
            },
            4,
        )
        .unwrap();

        assert!(cache.insert("track1", peaks));
        assert!(cache.load("track1").await.is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.lookup("other"), PeakLookup::Unknown);
    }
}
