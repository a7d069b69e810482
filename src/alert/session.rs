use std::sync::Arc;

use tokio::{
    sync::{broadcast, oneshot, watch},
    time::Duration,
};

use crate::{
    backend::AlertBackend,
    capture::{EvidenceTally, EvidenceUploader, RecorderConfig, RecorderController},
    device::{MediaDevice, OwnedStream},
    error::MediaError,
    models::{Alert, AlertId, Location},
    resolution::ResolutionPoller,
    settings::CoordinatorSettings,
};

use super::AlertEvent;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Everything that runs on behalf of one active alert. Torn down by
/// [`ActiveSession::shutdown`], which consumes it.
pub(super) struct ActiveSession {
    alert_id: AlertId,
    stream: Option<OwnedStream>,
    recorder: Option<RecorderController>,
    poller: ResolutionPoller,
    uploader: EvidenceUploader,
    location_tx: watch::Sender<Location>,
}

impl ActiveSession {
    /// Opens the camera, starts the recorder and the resolution poller.
    /// Capture failures leave the alert running without evidence.
    pub(super) async fn start(
        alert: &Alert,
        settings: &CoordinatorSettings,
        backend: Arc<dyn AlertBackend>,
        media: &dyn MediaDevice,
        events: broadcast::Sender<AlertEvent>,
    ) -> (Self, oneshot::Receiver<AlertId>) {
        let (location_tx, location_rx) = watch::channel(alert.location);
        let uploader = EvidenceUploader::new(backend.clone(), events.clone());

        let (stream, recorder) = match media.open().await {
            Ok(stream) => {
                let owned = OwnedStream::new(stream);
                let recorder = RecorderController::start(
                    alert.id.clone(),
                    owned.recorder_handle(),
                    uploader.clone(),
                    location_rx,
                    RecorderConfig::from(settings),
                );
                (Some(owned), Some(recorder))
            }
            Err(err) => {
                let reason = match err {
                    MediaError::PermissionDenied => "camera or microphone permission denied".to_string(),
                    other => other.to_string(),
                };
                log_warn!(
                    "alert {} continues without evidence capture: {}",
                    alert.id,
                    reason
                );
                let _ = events.send(AlertEvent::CaptureUnavailable { reason });
                (None, None)
            }
        };

        let (poller, resolved_rx) =
            ResolutionPoller::start(backend, alert.id.clone(), settings.poll_interval());

        (
            Self {
                alert_id: alert.id.clone(),
                stream,
                recorder,
                poller,
                uploader,
                location_tx,
            },
            resolved_rx,
        )
    }

    pub(super) fn is_capturing(&self) -> bool {
        self.stream.as_ref().is_some_and(OwnedStream::is_live)
            && self
                .recorder
                .as_ref()
                .is_some_and(RecorderController::is_running)
    }

    /// Later segments are tagged with this position.
    pub(super) fn push_location(&self, location: Location) {
        self.location_tx.send_replace(location);
    }

    pub(super) async fn shutdown(mut self, drain_timeout: Duration) -> EvidenceTally {
        if let Err(err) = self.poller.stop().await {
            log_error!("alert {}: {err:?}", self.alert_id);
        }

        if let Some(recorder) = &self.recorder {
            recorder.request_stop();
        }
        if let Some(stream) = self.stream.take() {
            if stream.stop() {
                log_info!("media tracks released for alert {}", self.alert_id);
            }
        }
        if let Some(mut recorder) = self.recorder.take() {
            if let Err(err) = recorder.join().await {
                log_error!("alert {}: {err:?}", self.alert_id);
            }
        }

        self.uploader.drain(drain_timeout).await;
        self.uploader.tally()
    }
}
