#![allow(dead_code)]

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use sos_beacon_lib::{
    alert::{AlertEvent, AlertLifecycleManager},
    backend::{AlertBackend, RemoteAlertStatus, SegmentUpload},
    device::{LocationSource, MediaDevice, MediaStream, RecordedClip},
    error::{LocationError, MediaError, ServiceError},
    models::{AlertId, AlertMetadata, FacilityKind, Location, SafeLocation},
    settings::CoordinatorSettings,
};

pub const LATITUDE: f64 = 12.9716;
pub const LONGITUDE: f64 = 77.5946;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub alert_id: String,
    pub sequence_number: u64,
    pub file_name: String,
    pub bytes: usize,
    pub latitude: Option<f64>,
}

/// In-memory backend that records every call.
pub struct FakeBackend {
    pub create_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub uploads: Mutex<Vec<UploadRecord>>,
    pub location_updates: Mutex<Vec<(String, Location)>>,
    resolved_ids: Mutex<HashSet<String>>,
    pub fail_create: AtomicBool,
    pub fail_upload: AtomicBool,
    pub fail_location: AtomicBool,
    pub fail_resolve: AtomicBool,
    pub fail_status: AtomicBool,
    pub create_delay: Mutex<Duration>,
    next_id: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            create_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            location_updates: Mutex::new(Vec::new()),
            resolved_ids: Mutex::new(HashSet::new()),
            fail_create: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            fail_location: AtomicBool::new(false),
            fail_resolve: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            create_delay: Mutex::new(Duration::ZERO),
            next_id: AtomicUsize::new(1),
        })
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn resolves(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Marks one alert resolved on the responder side.
    pub fn resolve_remotely(&self, alert_id: &str) {
        self.resolved_ids
            .lock()
            .unwrap()
            .insert(alert_id.to_string());
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = delay;
    }

    pub fn uploads_for(&self, alert_id: &str) -> Vec<UploadRecord> {
        let mut uploads: Vec<_> = self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|upload| upload.alert_id == alert_id)
            .cloned()
            .collect();
        uploads.sort_by_key(|upload| upload.sequence_number);
        uploads
    }

    fn unavailable() -> ServiceError {
        ServiceError::Status {
            status: 503,
            body: "service unavailable".into(),
        }
    }
}

#[async_trait]
impl AlertBackend for FakeBackend {
    async fn create_alert(
        &self,
        _location: &Location,
        _metadata: &AlertMetadata,
    ) -> Result<AlertId, ServiceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("alert-{n}"))
    }

    async fn send_location_update(
        &self,
        alert_id: &str,
        location: &Location,
    ) -> Result<(), ServiceError> {
        if self.fail_location.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("connection reset".into()));
        }
        self.location_updates
            .lock()
            .unwrap()
            .push((alert_id.to_string(), *location));
        Ok(())
    }

    async fn upload_evidence_segment(&self, upload: SegmentUpload<'_>) -> Result<(), ServiceError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.uploads.lock().unwrap().push(UploadRecord {
            alert_id: upload.alert_id.to_string(),
            sequence_number: upload.sequence_number,
            file_name: upload.file_name.to_string(),
            bytes: upload.payload.len(),
            latitude: upload.location.map(|location| location.latitude),
        });
        Ok(())
    }

    async fn get_alert_status(&self, alert_id: &str) -> Result<RemoteAlertStatus, ServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("timed out".into()));
        }
        Ok(RemoteAlertStatus {
            is_active: !self.resolved_ids.lock().unwrap().contains(alert_id),
        })
    }

    async fn resolve_alert(&self, alert_id: &str) -> Result<(), ServiceError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.resolve_remotely(alert_id);
        Ok(())
    }

    async fn find_nearest_safe_location(
        &self,
        location: &Location,
    ) -> Result<SafeLocation, ServiceError> {
        Ok(SafeLocation {
            id: Some("h-1".into()),
            name: "City Hospital".into(),
            kind: FacilityKind::Hospital,
            latitude: location.latitude + 0.01,
            longitude: location.longitude,
            address: None,
            distance_meters: Some(1100.0),
        })
    }
}

pub enum LocationScript {
    Fix,
    Denied,
    Hang,
}

pub struct ScriptedLocation {
    script: LocationScript,
}

impl ScriptedLocation {
    pub fn new(script: LocationScript) -> Arc<Self> {
        Arc::new(Self { script })
    }
}

#[async_trait]
impl LocationSource for ScriptedLocation {
    async fn current_location(&self) -> Result<Location, LocationError> {
        match self.script {
            LocationScript::Fix => Ok(Location::new(LATITUDE, LONGITUDE, Some(12.0))),
            LocationScript::Denied => Err(LocationError::PermissionDenied),
            LocationScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LocationError::Unavailable("never answered".into()))
            }
        }
    }
}

/// Camera stand-in. Each segment lasts the requested time (or until the
/// tracks stop) and yields the next scripted size, 4 KiB once the script
/// runs out.
pub struct FakeMedia {
    pub deny: AtomicBool,
    /// Clips come back at once instead of lasting the requested time.
    pub instant: AtomicBool,
    pub open_calls: AtomicUsize,
    pub streams: Mutex<Vec<Arc<FakeStream>>>,
    sizes: Mutex<VecDeque<usize>>,
}

pub const DEFAULT_SEGMENT_BYTES: usize = 4096;

impl FakeMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            deny: AtomicBool::new(false),
            instant: AtomicBool::new(false),
            open_calls: AtomicUsize::new(0),
            streams: Mutex::new(Vec::new()),
            sizes: Mutex::new(VecDeque::new()),
        })
    }

    pub fn denied() -> Arc<Self> {
        let media = Self::new();
        media.deny.store(true, Ordering::SeqCst);
        media
    }

    pub fn script_sizes(&self, sizes: &[usize]) {
        self.sizes.lock().unwrap().extend(sizes.iter().copied());
    }

    pub fn opens(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn stream(&self, index: usize) -> Arc<FakeStream> {
        self.streams.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl MediaDevice for FakeMedia {
    async fn open(&self) -> Result<Arc<dyn MediaStream>, MediaError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied);
        }
        let sizes = std::mem::take(&mut *self.sizes.lock().unwrap());
        let stream = Arc::new(FakeStream {
            instant: self.instant.load(Ordering::SeqCst),
            records: AtomicUsize::new(0),
            sizes: Mutex::new(sizes),
            stops: AtomicUsize::new(0),
            stop: CancellationToken::new(),
        });
        self.streams.lock().unwrap().push(stream.clone());
        Ok(stream)
    }
}

pub struct FakeStream {
    instant: bool,
    records: AtomicUsize,
    sizes: Mutex<VecDeque<usize>>,
    stops: AtomicUsize,
    stop: CancellationToken,
}

impl FakeStream {
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn record_count(&self) -> usize {
        self.records.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaStream for FakeStream {
    async fn record_segment(&self, max: Duration) -> Result<RecordedClip, MediaError> {
        if self.stop.is_cancelled() {
            return Err(MediaError::Stopped);
        }
        self.records.fetch_add(1, Ordering::SeqCst);
        let started = tokio::time::Instant::now();
        if !self.instant {
            tokio::select! {
                _ = tokio::time::sleep(max) => {}
                _ = self.stop.cancelled() => {}
            }
        }
        let size = self
            .sizes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DEFAULT_SEGMENT_BYTES);
        Ok(RecordedClip {
            payload: vec![0u8; size],
            duration: started.elapsed(),
        })
    }

    fn stop_tracks(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
    }

    fn is_live(&self) -> bool {
        !self.stop.is_cancelled()
    }
}

pub struct Harness {
    pub manager: AlertLifecycleManager,
    pub backend: Arc<FakeBackend>,
    pub media: Arc<FakeMedia>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ScriptedLocation::new(LocationScript::Fix), FakeMedia::new())
    }

    pub fn with(location: Arc<ScriptedLocation>, media: Arc<FakeMedia>) -> Self {
        let backend = FakeBackend::new();
        let manager = AlertLifecycleManager::new(
            CoordinatorSettings::default(),
            backend.clone(),
            location,
            media.clone(),
        );
        Self {
            manager,
            backend,
            media,
        }
    }
}

/// Drains whatever events are already buffered.
pub fn buffered(events: &mut broadcast::Receiver<AlertEvent>) -> Vec<AlertEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
