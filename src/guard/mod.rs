//! Single-activation guard: the countdown gate and the atomic
//! idle → triggering hand-off.

mod countdown;
pub mod state;

use std::{future::Future, sync::Arc};

use tokio::{sync::Mutex, task::JoinHandle, time::Duration};

pub use state::{ActivationTicket, GuardEvent, GuardState, GuardViolation, Phase};

#[derive(Clone)]
pub struct ActivationGuard {
    state: Arc<Mutex<GuardState>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Default for ActivationGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationGuard {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState::new())),
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn snapshot(&self) -> GuardState {
        *self.state.lock().await
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase()
    }

    pub async fn apply(&self, event: GuardEvent) -> Result<Phase, GuardViolation> {
        self.state.lock().await.apply(event)
    }

    /// Starts the countdown and returns the starting tick count. `on_tick`
    /// sees each later value down to 1; `on_elapsed` receives the ticket
    /// once the count runs out.
    pub async fn begin_countdown<T, E, Fut>(
        &self,
        ticks: u8,
        interval: Duration,
        on_tick: T,
        on_elapsed: E,
    ) -> Result<u8, GuardViolation>
    where
        T: Fn(u8) + Send + 'static,
        E: FnOnce(ActivationTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (epoch, remaining) = {
            let mut guard = self.state.lock().await;
            guard.apply(GuardEvent::BeginCountdown { ticks })?;
            (guard.epoch(), guard.remaining())
        };

        let handle = tokio::spawn(countdown::countdown_loop(
            self.state.clone(),
            epoch,
            interval,
            on_tick,
            on_elapsed,
        ));

        // A previous ticker may still be finishing its activation; detach it
        // rather than aborting.
        *self.ticker.lock().await = Some(handle);
        Ok(remaining)
    }

    pub async fn cancel(&self) -> Result<(), GuardViolation> {
        self.apply(GuardEvent::Cancel).await?;
        self.abort_ticker().await;
        Ok(())
    }

    /// Manual "send now". Wins only from `Idle` or `CountingDown`.
    pub async fn trigger(&self) -> Result<ActivationTicket, GuardViolation> {
        let ticket = {
            let mut guard = self.state.lock().await;
            guard.apply(GuardEvent::Trigger)?;
            guard.issue_ticket().ok_or(GuardViolation {
                phase: guard.phase(),
                event: GuardEvent::Trigger,
            })?
        };

        // The ticker cannot be mid-activation here: it would have had to win
        // the transition above first.
        self.abort_ticker().await;
        Ok(ticket)
    }

    /// Closes the `Triggering` window opened by `ticket`.
    pub async fn finish(
        &self,
        ticket: &ActivationTicket,
        activated: bool,
    ) -> Result<Phase, GuardViolation> {
        let event = if activated {
            GuardEvent::Activated
        } else {
            GuardEvent::ActivationFailed
        };

        let mut guard = self.state.lock().await;
        if guard.epoch() != ticket.epoch() {
            return Err(GuardViolation {
                phase: guard.phase(),
                event,
            });
        }
        guard.apply(event)
    }

    async fn abort_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}
