use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::{sync::broadcast, time::Duration};
use tokio_util::task::TaskTracker;

use crate::{
    alert::AlertEvent,
    backend::{AlertBackend, SegmentUpload},
    models::{EvidenceSegment, Location, UploadStatus},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Default)]
struct EvidenceStats {
    uploaded: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvidenceTally {
    pub uploaded: u64,
    pub failed: u64,
    pub discarded: u64,
}

/// Fire-and-forget delivery of finished segments. Each segment gets one
/// attempt; its outcome is counted and the payload dropped.
#[derive(Clone)]
pub struct EvidenceUploader {
    backend: Arc<dyn AlertBackend>,
    tracker: TaskTracker,
    stats: Arc<EvidenceStats>,
    events: broadcast::Sender<AlertEvent>,
}

impl EvidenceUploader {
    pub fn new(backend: Arc<dyn AlertBackend>, events: broadcast::Sender<AlertEvent>) -> Self {
        Self {
            backend,
            tracker: TaskTracker::new(),
            stats: Arc::new(EvidenceStats::default()),
            events,
        }
    }

    /// Starts the upload without waiting for it.
    pub fn submit(&self, mut segment: EvidenceSegment, location: Option<Location>) {
        let backend = self.backend.clone();
        let stats = self.stats.clone();
        let events = self.events.clone();

        self.tracker.spawn(async move {
            let file_name = segment.file_name();
            let result = backend
                .upload_evidence_segment(SegmentUpload {
                    alert_id: &segment.alert_id,
                    sequence_number: segment.sequence_number,
                    file_name: &file_name,
                    payload: &segment.payload,
                    location: location.as_ref(),
                })
                .await;

            match result {
                Ok(()) => {
                    segment.upload_status = UploadStatus::Uploaded;
                    stats.uploaded.fetch_add(1, Ordering::SeqCst);
                    log_info!(
                        "segment {} for alert {} {} ({} bytes)",
                        segment.sequence_number,
                        segment.alert_id,
                        segment.upload_status.as_str(),
                        segment.payload_size_bytes
                    );
                    let _ = events.send(AlertEvent::SegmentUploaded {
                        alert_id: segment.alert_id.clone(),
                        sequence_number: segment.sequence_number,
                        bytes: segment.payload_size_bytes,
                    });
                }
                Err(err) => {
                    segment.upload_status = UploadStatus::Failed;
                    stats.failed.fetch_add(1, Ordering::SeqCst);
                    log_error!(
                        "segment {} for alert {} {}: {}",
                        segment.sequence_number,
                        segment.alert_id,
                        segment.upload_status.as_str(),
                        err
                    );
                    let _ = events.send(AlertEvent::SegmentFailed {
                        alert_id: segment.alert_id.clone(),
                        sequence_number: segment.sequence_number,
                        reason: err.to_string(),
                    });
                }
            }
        });
    }

    pub fn record_discard(&self, alert_id: &str, bytes: usize) {
        self.stats.discarded.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(AlertEvent::SegmentDiscarded {
            alert_id: alert_id.to_string(),
            bytes,
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn tally(&self) -> EvidenceTally {
        EvidenceTally {
            uploaded: self.stats.uploaded.load(Ordering::SeqCst),
            failed: self.stats.failed.load(Ordering::SeqCst),
            discarded: self.stats.discarded.load(Ordering::SeqCst),
        }
    }

    /// Stops accepting work and waits up to `timeout` for in-flight uploads.
    /// Returns false if some were still running when the wait gave up.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            return true;
        }

        log_warn!(
            "{} evidence upload(s) still in flight after {:?}",
            self.tracker.len(),
            timeout
        );
        false
    }
}
