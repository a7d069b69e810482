//! Emergency backend contract consumed by the coordinator.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::ServiceError,
    models::{AlertId, AlertMetadata, Location, SafeLocation},
};

pub use http::HttpBackend;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAlertStatus {
    pub is_active: bool,
}

/// One evidence upload. The backend must accept these in any order.
#[derive(Debug, Clone, Copy)]
pub struct SegmentUpload<'a> {
    pub alert_id: &'a str,
    pub sequence_number: u64,
    pub file_name: &'a str,
    pub payload: &'a [u8],
    pub location: Option<&'a Location>,
}

#[async_trait]
pub trait AlertBackend: Send + Sync {
    async fn create_alert(
        &self,
        location: &Location,
        metadata: &AlertMetadata,
    ) -> Result<AlertId, ServiceError>;

    async fn send_location_update(
        &self,
        alert_id: &str,
        location: &Location,
    ) -> Result<(), ServiceError>;

    async fn upload_evidence_segment(&self, upload: SegmentUpload<'_>) -> Result<(), ServiceError>;

    async fn get_alert_status(&self, alert_id: &str) -> Result<RemoteAlertStatus, ServiceError>;

    async fn resolve_alert(&self, alert_id: &str) -> Result<(), ServiceError>;

    async fn find_nearest_safe_location(
        &self,
        location: &Location,
    ) -> Result<SafeLocation, ServiceError>;
}
