//! Ambient video that survives the platform suspending it in background
//! tabs.

mod memo;
mod video;

pub use memo::{HiddenPlaybackMemo, reconcile_position};
pub use video::VisibilityResumableVideo;
