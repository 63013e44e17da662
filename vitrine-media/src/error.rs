use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// How a failure is handled. Every path ends in "stop trying, show a neutral
/// state"; the class only decides whether that happens silently, after
/// automatic retries, or after tearing a session down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Optional data is missing (no peak descriptor, no poster). Fall back silently.
    ExpectedAbsent,
    /// Stall, underrun or rejected autoplay. Retried automatically, never surfaced.
    Transient,
    /// Unrecoverable after exhausting retries. Tear the session down, log only.
    FatalSession,
    /// Caller misuse such as an unknown id. No-op.
    Invariant,
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("peak descriptor request failed: {0}")]
    PeakFetch(String),

    #[error("invalid peak descriptor: {0}")]
    InvalidPeaks(String),

    #[error("manifest request failed: {0}")]
    ManifestFetch(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("playback request rejected: {0}")]
    PlayRejected(String),

    #[error("streaming session error: {0}")]
    Session(String),

    #[error("invalid media source url: {0}")]
    InvalidSource(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MediaError {
    pub fn fault_class(&self) -> FaultClass {
        match self {
            MediaError::PeakFetch(_)
            | MediaError::InvalidPeaks(_)
            | MediaError::Serialization(_) => FaultClass::ExpectedAbsent,
            MediaError::ManifestFetch(_)
            | MediaError::PlayRejected(_)
            | MediaError::Http(_) => FaultClass::Transient,
            MediaError::InvalidManifest(_) | MediaError::Session(_) => {
                FaultClass::FatalSession
            }
            MediaError::InvalidSource(_) => FaultClass::Invariant,
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;

/// Run a host-supplied callback, logging and swallowing both `Err` returns and
/// panics so registry bookkeeping always completes. Returns whether the
/// callback succeeded.
pub(crate) fn contain_callback(
    what: &str,
    callback: impl FnOnce() -> anyhow::Result<()>,
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            log::warn!("{what} failed: {err:#}");
            false
        }
        Err(_) => {
            log::error!("{what} panicked; continuing");
            false
        }
    }
}
