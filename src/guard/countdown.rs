use std::{future::Future, sync::Arc};

use tokio::{
    sync::Mutex,
    time::{self, Duration, Instant, MissedTickBehavior},
};

use super::state::{ActivationTicket, GuardEvent, GuardState, Phase};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Drives one countdown episode. Exits as soon as the guard leaves
/// `CountingDown` under this epoch (cancel, manual trigger, or a newer
/// countdown), so a stale ticker never fires.
pub(super) async fn countdown_loop<T, E, Fut>(
    state: Arc<Mutex<GuardState>>,
    epoch: u64,
    interval: Duration,
    on_tick: T,
    on_elapsed: E,
) where
    T: Fn(u8) + Send + 'static,
    E: FnOnce(ActivationTicket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let outcome = {
            let mut guard = state.lock().await;
            guard
                .apply(GuardEvent::Tick { epoch })
                .map(|phase| (phase, guard.remaining(), guard.issue_ticket()))
        };

        match outcome {
            Ok((Phase::CountingDown, remaining, _)) => on_tick(remaining),
            Ok((_, _, Some(ticket))) => {
                log_debug!("countdown {} elapsed, triggering", epoch);
                on_elapsed(ticket).await;
                break;
            }
            Ok(_) => break,
            Err(violation) => {
                log_debug!("countdown {} stopped: {}", epoch, violation);
                break;
            }
        }
    }
}
