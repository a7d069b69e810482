use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};

use chrono::Utc;
use tokio::{
    sync::{broadcast, oneshot, watch, Mutex},
    time,
};

use crate::{
    backend::AlertBackend,
    capture::EvidenceTally,
    device::{GeolocationProvider, LocationSource, MediaDevice},
    error::AlertError,
    guard::{ActivationGuard, ActivationTicket, GuardEvent, Phase},
    models::{
        Alert, AlertId, AlertMetadata, AlertStatus, Location, ResolutionReport, ResolvedBy,
        SafeLocation,
    },
    settings::CoordinatorSettings,
};

use super::{session::ActiveSession, AlertEvent, AlertSnapshot};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const EVENT_CAPACITY: usize = 64;

/// Coordinates one emergency alert at a time: countdown, activation,
/// evidence capture, location updates and teardown.
///
/// Lock order is session, then alert, then the guard state. Teardown runs
/// only for the caller that moved the guard from `Active` to `Resolving`.
#[derive(Clone)]
pub struct AlertLifecycleManager {
    inner: Arc<Inner>,
}

struct Inner {
    settings: CoordinatorSettings,
    guard: ActivationGuard,
    alert: Mutex<Option<Alert>>,
    session: Mutex<Option<ActiveSession>>,
    geolocation: GeolocationProvider,
    media: Arc<dyn MediaDevice>,
    backend: Arc<dyn AlertBackend>,
    snapshot_tx: watch::Sender<AlertSnapshot>,
    events_tx: broadcast::Sender<AlertEvent>,
    disposed: AtomicBool,
}

impl AlertLifecycleManager {
    pub fn new(
        settings: CoordinatorSettings,
        backend: Arc<dyn AlertBackend>,
        location: Arc<dyn LocationSource>,
        media: Arc<dyn MediaDevice>,
    ) -> Self {
        let geolocation = GeolocationProvider::new(location, settings.location_timeout());
        let (snapshot_tx, _) = watch::channel(AlertSnapshot::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                settings,
                guard: ActivationGuard::new(),
                alert: Mutex::new(None),
                session: Mutex::new(None),
                geolocation,
                media,
                backend,
                snapshot_tx,
                events_tx,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.inner.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<AlertSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AlertEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn status(&self) -> AlertStatus {
        self.inner.snapshot_tx.borrow().status
    }

    pub fn is_in_emergency(&self) -> bool {
        self.inner.snapshot_tx.borrow().is_in_emergency()
    }

    pub async fn current_alert(&self) -> Option<Alert> {
        self.inner.alert.lock().await.clone()
    }

    pub async fn nearest_safe_location(&self) -> Option<SafeLocation> {
        self.inner
            .alert
            .lock()
            .await
            .as_ref()
            .and_then(|alert| alert.nearest_safe_location.clone())
    }

    pub async fn phase(&self) -> Phase {
        self.inner.guard.phase().await
    }

    /// Arms the cancellable countdown. Returns false if a countdown, an
    /// activation or an alert is already underway.
    pub async fn begin_countdown(&self, metadata: Option<AlertMetadata>) -> bool {
        if self.is_disposed() {
            return false;
        }

        let metadata = metadata.unwrap_or_else(|| self.default_metadata());
        let ticking = self.clone();
        let activating = self.clone();

        let started = self
            .inner
            .guard
            .begin_countdown(
                self.inner.settings.countdown_ticks,
                self.inner.settings.tick_interval(),
                move |remaining| ticking.on_countdown_tick(remaining),
                move |ticket| async move {
                    // Failures are already published as events.
                    let _ = activating.run_activation(ticket, metadata).await;
                },
            )
            .await;

        match started {
            Ok(remaining) => {
                log_info!("emergency countdown started at {}", remaining);
                self.inner.snapshot_tx.send_if_modified(|snapshot| {
                    // The ticker may already have moved on.
                    if snapshot.phase != Phase::Idle {
                        return false;
                    }
                    snapshot.phase = Phase::CountingDown;
                    snapshot.countdown = Some(remaining);
                    snapshot.last_error = None;
                    true
                });
                self.emit(AlertEvent::CountdownStarted { remaining });
                true
            }
            Err(violation) => {
                log_info!("countdown ignored: {}", violation);
                false
            }
        }
    }

    pub async fn cancel_countdown(&self) -> bool {
        match self.inner.guard.cancel().await {
            Ok(()) => {
                log_info!("emergency countdown cancelled");
                self.publish(|snapshot| {
                    snapshot.phase = Phase::Idle;
                    snapshot.countdown = None;
                });
                self.emit(AlertEvent::CountdownCancelled);
                true
            }
            Err(violation) => {
                log_debug!("nothing to cancel: {}", violation);
                false
            }
        }
    }

    /// Activates immediately, preempting a running countdown. Fails with
    /// [`AlertError::GuardViolation`] while another activation or alert is
    /// in progress.
    pub async fn activate(&self, metadata: Option<AlertMetadata>) -> Result<Alert, AlertError> {
        if self.is_disposed() {
            return Err(AlertError::GuardViolation("disposed"));
        }

        let ticket = self.inner.guard.trigger().await.map_err(|violation| {
            log_info!("activation ignored: {}", violation);
            AlertError::GuardViolation(violation.phase.as_str())
        })?;

        let metadata = metadata.unwrap_or_else(|| self.default_metadata());
        self.run_activation(ticket, metadata).await
    }

    /// [`activate`](Self::activate) with duplicate requests swallowed.
    pub async fn trigger(&self, metadata: Option<AlertMetadata>) -> Result<Option<Alert>, AlertError> {
        match self.activate(metadata).await {
            Ok(alert) => Ok(Some(alert)),
            Err(AlertError::GuardViolation(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// User marked themselves safe. Returns `None` if there was no active
    /// alert or another teardown got there first.
    pub async fn deactivate(&self) -> Option<ResolutionReport> {
        let alert = self.begin_resolution(None).await?;

        let acknowledged = match self.inner.backend.resolve_alert(&alert.id).await {
            Ok(()) => true,
            Err(err) => {
                log_warn!(
                    "resolve request for alert {} failed, tearing down locally: {}",
                    alert.id,
                    err
                );
                false
            }
        };

        Some(self.teardown(alert, ResolvedBy::Local, acknowledged).await)
    }

    /// The backend reported `alert_id` inactive. Ignored unless it is the
    /// current alert. Does not call back into the backend.
    pub async fn on_external_resolution(&self, alert_id: &str) -> Option<ResolutionReport> {
        let alert = self.begin_resolution(Some(alert_id)).await?;
        Some(self.teardown(alert, ResolvedBy::External, true).await)
    }

    /// Forwards a fresh position to the backend. The local record changes
    /// only after the backend accepts it.
    pub async fn update_location(&self, location: Location) -> bool {
        if !location.has_coordinates() {
            log_warn!("ignoring location update without usable coordinates");
            return false;
        }

        let alert_id = {
            let alert = self.inner.alert.lock().await;
            let phase = self.inner.guard.phase().await;
            match alert.as_ref() {
                Some(alert) if phase == Phase::Active => alert.id.clone(),
                _ => {
                    log_debug!("location update ignored, no active alert");
                    return false;
                }
            }
        };

        if let Err(err) = self
            .inner
            .backend
            .send_location_update(&alert_id, &location)
            .await
        {
            log_warn!("location update for alert {} failed: {}", alert_id, err);
            return false;
        }

        let updated = {
            let mut alert = self.inner.alert.lock().await;
            match alert.as_mut() {
                Some(alert) if alert.id == alert_id => {
                    alert.location = location;
                    Some(alert.clone())
                }
                _ => None,
            }
        };
        let Some(updated) = updated else {
            return false;
        };

        if let Some(session) = self.inner.session.lock().await.as_ref() {
            session.push_location(location);
        }
        self.publish(|snapshot| snapshot.alert = Some(updated));
        self.emit(AlertEvent::LocationUpdated { location });
        true
    }

    /// Stops everything this manager started. An alert still being created
    /// is resolved as soon as its activation completes.
    pub async fn shutdown(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel_countdown().await;
        match self.inner.guard.phase().await {
            Phase::Active => {
                self.deactivate().await;
            }
            Phase::Triggering | Phase::Resolving => {
                log_info!("waiting for in-flight alert work before shutdown");
                let limit = self.inner.settings.location_timeout()
                    + self.inner.settings.backend.request_timeout() * 3
                    + self.inner.settings.upload_drain_timeout();
                let mut rx = self.subscribe();
                let settled = time::timeout(limit, async {
                    // Every guard return to Idle is followed by a publish.
                    loop {
                        rx.borrow_and_update();
                        if matches!(
                            self.inner.guard.phase().await,
                            Phase::Idle | Phase::CountingDown
                        ) {
                            break;
                        }
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await
                .is_ok();
                if !settled {
                    log_warn!("in-flight alert work did not settle within {:?}", limit);
                }
            }
            Phase::Idle | Phase::CountingDown => {}
        }
    }

    fn default_metadata(&self) -> AlertMetadata {
        AlertMetadata::new(
            self.inner.settings.emergency_type.clone(),
            self.inner.settings.description.clone(),
        )
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn on_countdown_tick(&self, remaining: u8) {
        self.inner.snapshot_tx.send_if_modified(|snapshot| {
            if snapshot.phase != Phase::CountingDown {
                return false;
            }
            snapshot.countdown = Some(remaining);
            true
        });
        self.emit(AlertEvent::CountdownTick { remaining });
    }

    async fn run_activation(
        &self,
        ticket: ActivationTicket,
        metadata: AlertMetadata,
    ) -> Result<Alert, AlertError> {
        self.publish(|snapshot| {
            snapshot.phase = Phase::Triggering;
            snapshot.status = AlertStatus::Activating;
            snapshot.countdown = None;
            snapshot.last_error = None;
        });
        self.emit(AlertEvent::ActivationStarted);

        match self.create_and_start(&ticket, metadata).await {
            Ok(alert) => {
                if self.is_disposed() {
                    log_info!("alert {} created during shutdown, resolving", alert.id);
                    self.deactivate().await;
                }
                Ok(alert)
            }
            Err(err) => {
                log_error!("emergency activation failed: {}", err);
                if let Err(violation) = self.inner.guard.finish(&ticket, false).await {
                    log_error!("activation rollback rejected: {}", violation);
                }

                let message = err.to_string();
                self.publish(|snapshot| {
                    *snapshot = AlertSnapshot {
                        last_error: Some(message.clone()),
                        ..AlertSnapshot::default()
                    };
                });
                let fallback = if err.requires_fallback() {
                    self.inner.settings.primary_contact().cloned()
                } else {
                    None
                };
                self.emit(AlertEvent::ActivationFailed { message, fallback });
                Err(err)
            }
        }
    }

    async fn create_and_start(
        &self,
        ticket: &ActivationTicket,
        metadata: AlertMetadata,
    ) -> Result<Alert, AlertError> {
        let location = self.inner.geolocation.acquire().await?;
        let alert_id = self
            .inner
            .backend
            .create_alert(&location, &metadata)
            .await?;
        log_info!("alert {} created ({})", alert_id, metadata.emergency_type);

        let nearest_safe_location = match self
            .inner
            .backend
            .find_nearest_safe_location(&location)
            .await
        {
            Ok(safe) => Some(safe),
            Err(err) => {
                log_warn!("nearest safe location lookup failed: {}", err);
                None
            }
        };

        let alert = Alert {
            id: alert_id,
            location,
            created_at: Utc::now(),
            status: AlertStatus::Active,
            metadata,
            nearest_safe_location,
        };

        let mut session_slot = self.inner.session.lock().await;
        {
            let mut current = self.inner.alert.lock().await;
            self.inner
                .guard
                .finish(ticket, true)
                .await
                .map_err(|violation| AlertError::GuardViolation(violation.phase.as_str()))?;
            *current = Some(alert.clone());
        }

        let (session, resolved_rx) = ActiveSession::start(
            &alert,
            &self.inner.settings,
            self.inner.backend.clone(),
            self.inner.media.as_ref(),
            self.inner.events_tx.clone(),
        )
        .await;
        let is_capturing = session.is_capturing();
        *session_slot = Some(session);

        let watcher = Arc::downgrade(&self.inner);
        tokio::spawn(watch_resolution(watcher, resolved_rx));

        self.publish(|snapshot| {
            snapshot.phase = Phase::Active;
            snapshot.status = AlertStatus::Active;
            snapshot.alert = Some(alert.clone());
            snapshot.is_capturing = is_capturing;
        });
        self.emit(AlertEvent::Activated {
            alert: alert.clone(),
        });
        drop(session_slot);

        Ok(alert)
    }

    /// Claims the teardown. Only one caller per alert gets `Some`.
    async fn begin_resolution(&self, expected_id: Option<&str>) -> Option<Alert> {
        let alert = {
            let current = self.inner.alert.lock().await;
            let alert = current.as_ref()?;
            if expected_id.is_some_and(|id| id != alert.id) {
                log_debug!("resolution for stale alert {:?} ignored", expected_id);
                return None;
            }
            if let Err(violation) = self.inner.guard.apply(GuardEvent::BeginResolve).await {
                log_debug!("resolution already underway: {}", violation);
                return None;
            }
            alert.clone()
        };

        self.publish(|snapshot| {
            snapshot.phase = Phase::Resolving;
            snapshot.status = AlertStatus::Resolved;
            if let Some(alert) = snapshot.alert.as_mut() {
                alert.status = AlertStatus::Resolved;
            }
        });
        Some(alert)
    }

    async fn teardown(
        &self,
        alert: Alert,
        resolved_by: ResolvedBy,
        backend_acknowledged: bool,
    ) -> ResolutionReport {
        let session = self.inner.session.lock().await.take();
        let tally = match session {
            Some(session) => {
                session
                    .shutdown(self.inner.settings.upload_drain_timeout())
                    .await
            }
            None => EvidenceTally::default(),
        };

        {
            let mut current = self.inner.alert.lock().await;
            *current = None;
            if let Err(violation) = self.inner.guard.apply(GuardEvent::Resolved).await {
                log_error!("resolve transition rejected: {}", violation);
            }
        }

        let report = ResolutionReport {
            alert_id: alert.id.clone(),
            resolved_by,
            backend_acknowledged,
            segments_uploaded: tally.uploaded,
            segments_failed: tally.failed,
            segments_discarded: tally.discarded,
            duration_ms: alert.elapsed().as_millis() as u64,
        };
        log_info!(
            "alert {} resolved ({:?}): {} uploaded, {} failed, {} discarded",
            report.alert_id,
            report.resolved_by,
            report.segments_uploaded,
            report.segments_failed,
            report.segments_discarded
        );

        self.publish(|snapshot| *snapshot = AlertSnapshot::default());
        self.emit(AlertEvent::Resolved {
            report: report.clone(),
        });
        report
    }

    fn publish(&self, update: impl FnOnce(&mut AlertSnapshot)) {
        self.inner.snapshot_tx.send_modify(update);
    }

    fn emit(&self, event: AlertEvent) {
        // No subscribers is fine.
        let _ = self.inner.events_tx.send(event);
    }
}

async fn watch_resolution(
    inner: Weak<Inner>,
    resolved_rx: oneshot::Receiver<AlertId>,
) {
    let Ok(alert_id) = resolved_rx.await else {
        return;
    };
    let Some(inner) = inner.upgrade() else {
        return;
    };
    AlertLifecycleManager { inner }
        .on_external_resolution(&alert_id)
        .await;
}
