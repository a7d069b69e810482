use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::error::MediaError;

/// Camera + microphone source.
#[async_trait]
pub trait MediaDevice: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn MediaStream>, MediaError>;
}

#[derive(Debug, Clone, Default)]
pub struct RecordedClip {
    pub payload: Vec<u8>,
    pub duration: Duration,
}

/// A live capture. `record_segment` ends early, returning what it already
/// captured, once `stop_tracks` has been called.
#[async_trait]
pub trait MediaStream: Send + Sync {
    async fn record_segment(&self, max: Duration) -> Result<RecordedClip, MediaError>;

    fn stop_tracks(&self);

    fn is_live(&self) -> bool;
}

/// The one owner of a live stream. Only the owner may stop tracks, and it
/// stops them at most once.
pub struct OwnedStream {
    stream: Arc<dyn MediaStream>,
    stopped: AtomicBool,
}

impl OwnedStream {
    pub fn new(stream: Arc<dyn MediaStream>) -> Self {
        Self {
            stream,
            stopped: AtomicBool::new(false),
        }
    }

    /// A record-only view for the recorder loop.
    pub fn recorder_handle(&self) -> RecorderHandle {
        RecorderHandle {
            stream: self.stream.clone(),
        }
    }

    pub fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && self.stream.is_live()
    }

    /// Returns false if the tracks were already stopped.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.stream.stop_tracks();
        true
    }
}

impl Drop for OwnedStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone)]
pub struct RecorderHandle {
    stream: Arc<dyn MediaStream>,
}

impl RecorderHandle {
    pub async fn record_segment(&self, max: Duration) -> Result<RecordedClip, MediaError> {
        self.stream.record_segment(max).await
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_live()
    }
}
