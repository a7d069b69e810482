use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{AlertError, LocationError},
    models::Location,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// One-shot position fix.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_location(&self) -> Result<Location, LocationError>;
}

/// Wraps a [`LocationSource`] with the activation time bound.
#[derive(Clone)]
pub struct GeolocationProvider {
    source: Arc<dyn LocationSource>,
    timeout: Duration,
}

impl GeolocationProvider {
    pub fn new(source: Arc<dyn LocationSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn acquire(&self) -> Result<Location, AlertError> {
        match tokio::time::timeout(self.timeout, self.source.current_location()).await {
            Ok(Ok(location)) if location.has_coordinates() => {
                log_info!(
                    "location acquired ({:.5}, {:.5}) accuracy={:?}m",
                    location.latitude,
                    location.longitude,
                    location.accuracy_meters
                );
                Ok(location)
            }
            Ok(Ok(_)) => {
                log_warn!("location source returned no usable coordinates");
                Err(AlertError::Unavailable("no usable coordinates".into()))
            }
            Ok(Err(err)) => {
                log_warn!("location request failed: {}", err);
                Err(err.into())
            }
            Err(_) => {
                log_warn!("location request timed out after {:?}", self.timeout);
                Err(AlertError::Timeout(self.timeout))
            }
        }
    }
}

/// Fixed coordinates, for kiosks and the console binary where the device
/// position is configured rather than sensed.
#[derive(Debug, Clone)]
pub struct StaticLocationSource {
    latitude: f64,
    longitude: f64,
    accuracy_meters: Option<f64>,
}

impl StaticLocationSource {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
        }
    }
}

#[async_trait]
impl LocationSource for StaticLocationSource {
    async fn current_location(&self) -> Result<Location, LocationError> {
        let location = Location::new(self.latitude, self.longitude, self.accuracy_meters);
        if location.has_coordinates() {
            Ok(location)
        } else {
            Err(LocationError::Unavailable(
                "device coordinates are not configured".into(),
            ))
        }
    }
}
