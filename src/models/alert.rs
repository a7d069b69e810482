use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Location, SafeLocation};

/// Backend-assigned alert identifier.
pub type AlertId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AlertStatus {
    #[default]
    Inactive,
    Activating,
    Active,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Inactive => "inactive",
            AlertStatus::Activating => "activating",
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertMetadata {
    pub emergency_type: String,
    pub description: String,
    pub requested_at: DateTime<Utc>,
}

impl AlertMetadata {
    pub fn new(emergency_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            emergency_type: emergency_type.into(),
            description: description.into(),
            requested_at: Utc::now(),
        }
    }
}

impl Default for AlertMetadata {
    fn default() -> Self {
        Self::new("general_emergency", "Emergency assistance needed")
    }
}

/// One emergency episode. Only the lifecycle manager mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub location: Location,
    pub created_at: DateTime<Utc>,
    pub status: AlertStatus,
    pub metadata: AlertMetadata,
    pub nearest_safe_location: Option<SafeLocation>,
}

impl Alert {
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Utc::now())
    }

    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ResolvedBy {
    /// The user marked themselves safe.
    Local,
    /// The backend reported the alert inactive (authority console).
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub alert_id: AlertId,
    pub resolved_by: ResolvedBy,
    /// False when the resolve request failed and only local teardown ran.
    pub backend_acknowledged: bool,
    pub segments_uploaded: u64,
    pub segments_failed: u64,
    pub segments_discarded: u64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn elapsed_never_goes_negative() {
        let created_at = Utc::now();
        let alert = Alert {
            id: "A1".into(),
            location: Location::new(1.0, 2.0, None),
            created_at,
            status: AlertStatus::Active,
            metadata: AlertMetadata::default(),
            nearest_safe_location: None,
        };

        assert_eq!(
            alert.elapsed_at(created_at + ChronoDuration::seconds(42)),
            Duration::from_secs(42)
        );
        assert_eq!(
            alert.elapsed_at(created_at - ChronoDuration::seconds(5)),
            Duration::ZERO
        );
    }
}
