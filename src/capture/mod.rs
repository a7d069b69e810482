//! Chunked evidence capture: a recorder loop cutting the live stream into
//! fixed-length segments, and the uploader that ships them.

mod controller;
mod loop_worker;
pub mod uploader;

use tokio::time::Duration;

use crate::settings::CoordinatorSettings;

pub use controller::RecorderController;
pub use uploader::{EvidenceTally, EvidenceUploader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    pub segment_duration: Duration,
    /// Segments no larger than this are treated as corrupt and dropped.
    pub min_segment_bytes: usize,
}

impl From<&CoordinatorSettings> for RecorderConfig {
    fn from(settings: &CoordinatorSettings) -> Self {
        Self {
            segment_duration: settings.segment_duration(),
            min_segment_bytes: settings.min_segment_bytes,
        }
    }
}
