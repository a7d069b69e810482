use anyhow::{Context, Result};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    device::RecorderHandle,
    models::{AlertId, Location},
};

use super::{
    loop_worker::{recording_loop, RecorderContext},
    uploader::EvidenceUploader,
    RecorderConfig,
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Owns the recording task of one alert. Sequence numbers restart at 1 for
/// every controller.
pub struct RecorderController {
    handle: Option<JoinHandle<()>>,
    stop: CancellationToken,
}

impl RecorderController {
    pub fn start(
        alert_id: AlertId,
        stream: RecorderHandle,
        uploader: EvidenceUploader,
        location_rx: watch::Receiver<Location>,
        config: RecorderConfig,
    ) -> Self {
        let stop = CancellationToken::new();
        log_info!(
            "recording evidence for alert {} in {:?} segments",
            alert_id,
            config.segment_duration
        );

        let ctx = RecorderContext {
            alert_id,
            stream,
            uploader,
            location_rx,
            config,
        };
        let handle = tokio::spawn(recording_loop(ctx, stop.clone()));

        Self {
            handle: Some(handle),
            stop,
        }
    }

    /// No new segment starts after this; the current one finishes.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn join(&mut self) -> Result<()> {
        self.request_stop();
        match self.handle.take() {
            Some(handle) => handle.await.context("recorder task failed to join"),
            None => Ok(()),
        }
    }
}

impl Drop for RecorderController {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
