//! Error taxonomy for the alert coordinator.
//!
//! Device and backend errors stay specific to their layer; the coordinator
//! folds them into [`AlertError`] when an activation attempt fails.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected backend response: {0}")]
    Decode(String),

    #[error("request rejected before sending: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("location access denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("camera/microphone access denied")]
    PermissionDenied,

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("recording failed: {0}")]
    Recording(String),

    #[error("media stream already stopped")]
    Stopped,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("location request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("location unavailable: {0}")]
    Unavailable(String),

    #[error("emergency service error: {0}")]
    Service(#[from] ServiceError),

    /// Duplicate activation or trigger. Callers swallow this.
    #[error("activation already in progress ({0})")]
    GuardViolation(&'static str),
}

impl AlertError {
    /// Whether the UI should offer the direct-call fallback.
    pub fn requires_fallback(&self) -> bool {
        !matches!(self, AlertError::GuardViolation(_))
    }
}

impl From<LocationError> for AlertError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => AlertError::Permission("location".into()),
            LocationError::Unavailable(reason) => AlertError::Unavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_violation_is_the_only_silent_error() {
        assert!(!AlertError::GuardViolation("triggering").requires_fallback());
        assert!(AlertError::Timeout(Duration::from_secs(10)).requires_fallback());
        assert!(AlertError::Service(ServiceError::Transport("dns".into())).requires_fallback());
        assert!(AlertError::from(LocationError::PermissionDenied).requires_fallback());
    }

    #[test]
    fn timeout_message_reports_whole_seconds() {
        let err = AlertError::Timeout(Duration::from_millis(10_000));
        assert_eq!(err.to_string(), "location request timed out after 10s");
    }
}
