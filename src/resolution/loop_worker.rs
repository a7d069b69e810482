use std::sync::Arc;

use tokio::{
    sync::oneshot,
    time::{self, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{backend::AlertBackend, models::AlertId};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Polls the backend for `alert_id`. The first query goes out immediately.
/// Sends the id exactly once when the backend reports the alert inactive,
/// then exits. Query failures are logged and polling continues.
pub(super) async fn polling_loop(
    backend: Arc<dyn AlertBackend>,
    alert_id: AlertId,
    interval: Duration,
    cancel: CancellationToken,
    resolved_tx: oneshot::Sender<AlertId>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => {
                log_debug!("resolution poller for alert {} cancelled", alert_id);
                return;
            }
        }

        let status = tokio::select! {
            status = backend.get_alert_status(&alert_id) => status,
            _ = cancel.cancelled() => {
                log_debug!("resolution poller for alert {} cancelled mid-query", alert_id);
                return;
            }
        };

        match status {
            Ok(status) if status.is_active => {}
            Ok(_) => {
                log_info!("alert {} resolved by responders", alert_id);
                let _ = resolved_tx.send(alert_id);
                return;
            }
            Err(err) => log_warn!("status check for alert {} failed: {}", alert_id, err),
        }
    }
}
