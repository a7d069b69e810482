use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AlertId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Pending,
    Uploaded,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Failed => "failed",
        }
    }
}

/// One finalized recording slice. Dropped once its single upload attempt
/// resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceSegment {
    pub alert_id: AlertId,
    pub sequence_number: u64,
    pub payload_size_bytes: usize,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
    pub upload_status: UploadStatus,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl EvidenceSegment {
    pub fn new(
        alert_id: AlertId,
        sequence_number: u64,
        payload: Vec<u8>,
        duration_ms: u64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id,
            sequence_number,
            payload_size_bytes: payload.len(),
            duration_ms,
            recorded_at,
            upload_status: UploadStatus::Pending,
            payload,
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "emergency-video-{}-chunk-{}.webm",
            self.alert_id, self.sequence_number
        )
    }
}
