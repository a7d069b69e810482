use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    multipart::{Form, Part},
    Client, Method, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::{AlertBackend, RemoteAlertStatus, SegmentUpload};
use crate::{
    error::ServiceError,
    models::{AlertId, AlertMetadata, FacilityKind, Location, SafeLocation},
    settings::BackendSettings,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const EVIDENCE_MIME: &str = "video/webm";
/// Longest error body kept in a `ServiceError::Status`.
const MAX_ERROR_BODY: usize = 512;

/// REST client for the emergency service (`/sos/...` routes).
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    safe_location_radius_m: u32,
}

#[derive(Serialize)]
struct CreateAlertRequest<'a> {
    latitude: f64,
    longitude: f64,
    emergency_type: &'a str,
    description: &'a str,
    timestamp: String,
}

#[derive(Deserialize)]
struct CreateAlertResponse {
    sos_id: Value,
}

#[derive(Serialize)]
struct LocationUpdateRequest<'a> {
    sos_id: &'a str,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    timestamp: String,
}

#[derive(Deserialize)]
struct AlertDetailResponse {
    is_active: bool,
}

#[derive(Serialize)]
struct NearestSafeLocationRequest {
    latitude: f64,
    longitude: f64,
    radius: u32,
}

#[derive(Deserialize)]
struct NearestSafeLocationResponse {
    nearest_location: FacilityRecord,
}

#[derive(Deserialize)]
struct FacilityRecord {
    id: Option<Value>,
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    distance: Option<f64>,
}

impl From<FacilityRecord> for SafeLocation {
    fn from(record: FacilityRecord) -> Self {
        let kind = match record.kind.as_deref() {
            Some("hospital") => FacilityKind::Hospital,
            Some("police") => FacilityKind::Police,
            _ => FacilityKind::Other,
        };

        SafeLocation {
            id: record.id.and_then(|id| id_from_json(&id)),
            name: record.name,
            kind,
            latitude: record.latitude,
            longitude: record.longitude,
            address: record.address.filter(|address| !address.is_empty()),
            distance_meters: record.distance,
        }
    }
}

/// The service issues numeric ids; keep them as opaque strings.
fn id_from_json(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn require_coordinates(location: &Location) -> Result<(), ServiceError> {
    if location.has_coordinates() {
        Ok(())
    } else {
        Err(ServiceError::Rejected("location coordinates are required".into()))
    }
}

fn transport(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.to_string())
}

impl HttpBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            auth_token: settings.auth_token.clone(),
            safe_location_radius_m: settings.safe_location_radius_m,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, join_url(&self.base_url, path));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ServiceError> {
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        body.truncate(
            body.char_indices()
                .nth(MAX_ERROR_BODY)
                .map(|(idx, _)| idx)
                .unwrap_or(body.len()),
        );
        log_warn!("backend answered {}: {}", status, body);
        Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        response
            .json::<T>()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))
    }
}

#[async_trait]
impl AlertBackend for HttpBackend {
    async fn create_alert(
        &self,
        location: &Location,
        metadata: &AlertMetadata,
    ) -> Result<AlertId, ServiceError> {
        require_coordinates(location)?;

        let body = CreateAlertRequest {
            latitude: location.latitude,
            longitude: location.longitude,
            emergency_type: &metadata.emergency_type,
            description: &metadata.description,
            timestamp: metadata.requested_at.to_rfc3339(),
        };
        let response = self
            .send(self.request(Method::POST, "sos/emergency/").json(&body))
            .await?;
        let created: CreateAlertResponse = Self::decode(response).await?;

        id_from_json(&created.sos_id)
            .ok_or_else(|| ServiceError::Decode(format!("unusable sos_id {}", created.sos_id)))
    }

    async fn send_location_update(
        &self,
        alert_id: &str,
        location: &Location,
    ) -> Result<(), ServiceError> {
        require_coordinates(location)?;

        let body = LocationUpdateRequest {
            sos_id: alert_id,
            latitude: location.latitude,
            longitude: location.longitude,
            accuracy: location.accuracy_meters,
            timestamp: Utc::now().to_rfc3339(),
        };
        self.send(self.request(Method::POST, "sos/location-update/").json(&body))
            .await?;
        Ok(())
    }

    async fn upload_evidence_segment(&self, upload: SegmentUpload<'_>) -> Result<(), ServiceError> {
        let video = Part::bytes(upload.payload.to_vec())
            .file_name(upload.file_name.to_string())
            .mime_str(EVIDENCE_MIME)
            .map_err(transport)?;

        let mut form = Form::new()
            .part("video", video)
            .text("sos_id", upload.alert_id.to_string())
            .text("chunk_number", upload.sequence_number.to_string());
        if let Some(location) = upload.location {
            form = form
                .text("latitude", location.latitude.to_string())
                .text("longitude", location.longitude.to_string());
        }

        self.send(self.request(Method::POST, "sos/camera-feed/").multipart(form))
            .await?;
        log_debug!(
            "uploaded {} ({} bytes)",
            upload.file_name,
            upload.payload.len()
        );
        Ok(())
    }

    async fn get_alert_status(&self, alert_id: &str) -> Result<RemoteAlertStatus, ServiceError> {
        let response = self
            .send(self.request(Method::GET, &format!("sos/emergency/{alert_id}/")))
            .await?;
        let detail: AlertDetailResponse = Self::decode(response).await?;
        Ok(RemoteAlertStatus {
            is_active: detail.is_active,
        })
    }

    async fn resolve_alert(&self, alert_id: &str) -> Result<(), ServiceError> {
        self.send(self.request(Method::POST, &format!("sos/resolve/{alert_id}/")))
            .await?;
        Ok(())
    }

    async fn find_nearest_safe_location(
        &self,
        location: &Location,
    ) -> Result<SafeLocation, ServiceError> {
        require_coordinates(location)?;

        let body = NearestSafeLocationRequest {
            latitude: location.latitude,
            longitude: location.longitude,
            radius: self.safe_location_radius_m,
        };
        let response = self
            .send(
                self.request(Method::POST, "sos/nearest-safe-location/")
                    .json(&body),
            )
            .await?;
        let nearest: NearestSafeLocationResponse = Self::decode(response).await?;
        Ok(nearest.nearest_location.into())
    }
}
