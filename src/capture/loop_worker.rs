use chrono::Utc;
use tokio::{
    sync::watch,
    time::{self, Duration},
};
use tokio_util::sync::CancellationToken;

use crate::{
    device::RecorderHandle,
    error::MediaError,
    models::{AlertId, EvidenceSegment, Location},
};

use super::{uploader::EvidenceUploader, RecorderConfig};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const RETRY_PAUSE: Duration = Duration::from_secs(1);
const DISCARD_PAUSE: Duration = Duration::from_millis(100);

pub(super) struct RecorderContext {
    pub alert_id: AlertId,
    pub stream: RecorderHandle,
    pub uploader: EvidenceUploader,
    pub location_rx: watch::Receiver<Location>,
    pub config: RecorderConfig,
}

/// Records back-to-back segments until stopped. A stop request never cuts
/// the current segment short by itself; stopping the stream does, and that
/// partial segment is still handed to the uploader.
pub(super) async fn recording_loop(ctx: RecorderContext, stop: CancellationToken) {
    let mut sequence_number: u64 = 0;

    loop {
        if stop.is_cancelled() {
            break;
        }

        let recorded_at = Utc::now();
        match ctx.stream.record_segment(ctx.config.segment_duration).await {
            Ok(clip) => {
                let bytes = clip.payload.len();
                if bytes <= ctx.config.min_segment_bytes {
                    log_warn!(
                        "discarding {} byte segment for alert {} (must exceed {})",
                        bytes,
                        ctx.alert_id,
                        ctx.config.min_segment_bytes
                    );
                    ctx.uploader.record_discard(&ctx.alert_id, bytes);
                    // A stream that keeps returning empty clips must not spin.
                    tokio::select! {
                        _ = time::sleep(DISCARD_PAUSE) => {}
                        _ = stop.cancelled() => break,
                    }
                    continue;
                }

                sequence_number += 1;
                let location = *ctx.location_rx.borrow();
                let segment = EvidenceSegment::new(
                    ctx.alert_id.clone(),
                    sequence_number,
                    clip.payload,
                    clip.duration.as_millis() as u64,
                    recorded_at,
                );
                log_debug!(
                    "segment {} recorded: {} bytes in {}ms",
                    sequence_number,
                    bytes,
                    segment.duration_ms
                );
                ctx.uploader.submit(segment, Some(location));
            }
            Err(MediaError::Stopped) => break,
            Err(err) => {
                log_error!("recording failed for alert {}: {}", ctx.alert_id, err);
                if !ctx.stream.is_live() {
                    break;
                }
                tokio::select! {
                    _ = time::sleep(RETRY_PAUSE) => {}
                    _ = stop.cancelled() => break,
                }
            }
        }
    }

    log_info!(
        "recorder for alert {} stopped after {} segment(s)",
        ctx.alert_id,
        sequence_number
    );
}
