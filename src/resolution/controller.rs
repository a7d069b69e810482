use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{sync::oneshot, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{backend::AlertBackend, models::AlertId};

use super::loop_worker::polling_loop;

/// Watches one alert for resolution on the responder side.
pub struct ResolutionPoller {
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl ResolutionPoller {
    /// Starts polling. The receiver yields the alert id once, if and when
    /// the backend reports it inactive.
    pub fn start(
        backend: Arc<dyn AlertBackend>,
        alert_id: AlertId,
        interval: Duration,
    ) -> (Self, oneshot::Receiver<AlertId>) {
        let cancel = CancellationToken::new();
        let (resolved_tx, resolved_rx) = oneshot::channel();
        let handle = tokio::spawn(polling_loop(
            backend,
            alert_id,
            interval,
            cancel.clone(),
            resolved_tx,
        ));

        (
            Self {
                handle: Some(handle),
                cancel,
            },
            resolved_rx,
        )
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels polling, including a query already in flight.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.context("resolution poller failed to join"),
            None => Ok(()),
        }
    }
}

impl Drop for ResolutionPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
