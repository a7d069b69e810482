use serde::Serialize;

use crate::{
    guard::Phase,
    models::{Alert, AlertStatus, Location, ResolutionReport},
    settings::EmergencyContact,
};

/// Observable coordinator state for the countdown overlay, the active
/// emergency banner and the live-preview panel.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertSnapshot {
    pub status: AlertStatus,
    pub phase: Phase,
    pub countdown: Option<u8>,
    pub alert: Option<Alert>,
    pub is_capturing: bool,
    pub last_error: Option<String>,
}

impl AlertSnapshot {
    pub fn is_in_emergency(&self) -> bool {
        self.status == AlertStatus::Active
            && self.alert.as_ref().is_some_and(Alert::is_active)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AlertEvent {
    CountdownStarted {
        remaining: u8,
    },
    CountdownTick {
        remaining: u8,
    },
    CountdownCancelled,
    ActivationStarted,
    Activated {
        alert: Alert,
    },
    ActivationFailed {
        message: String,
        fallback: Option<EmergencyContact>,
    },
    CaptureUnavailable {
        reason: String,
    },
    LocationUpdated {
        location: Location,
    },
    SegmentUploaded {
        alert_id: String,
        sequence_number: u64,
        bytes: usize,
    },
    SegmentFailed {
        alert_id: String,
        sequence_number: u64,
        reason: String,
    },
    SegmentDiscarded {
        alert_id: String,
        bytes: usize,
    },
    Resolved {
        report: ResolutionReport,
    },
}
