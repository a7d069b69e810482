use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    CountingDown,
    Triggering,
    Active,
    Resolving,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::CountingDown => "countingDown",
            Phase::Triggering => "triggering",
            Phase::Active => "active",
            Phase::Resolving => "resolving",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardEvent {
    BeginCountdown { ticks: u8 },
    Tick { epoch: u64 },
    Cancel,
    Trigger,
    Activated,
    ActivationFailed,
    BeginResolve,
    Resolved,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{event:?} rejected while {}", .phase.as_str())]
pub struct GuardViolation {
    pub phase: Phase,
    pub event: GuardEvent,
}

/// Proof that the holder won the race into `Triggering`. Only the guard can
/// mint one, and only the epoch it was minted for can be finished with it.
#[derive(Debug)]
pub struct ActivationTicket {
    epoch: u64,
}

impl ActivationTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardState {
    phase: Phase,
    remaining: u8,
    epoch: u64,
}

impl GuardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Seconds left on the countdown; zero outside `CountingDown`.
    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The only place the phase changes. Checks and updates in one step.
    pub fn apply(&mut self, event: GuardEvent) -> Result<Phase, GuardViolation> {
        let violation = GuardViolation {
            phase: self.phase,
            event,
        };

        match (self.phase, event) {
            (Phase::Idle, GuardEvent::BeginCountdown { ticks }) => {
                self.epoch = self.epoch.wrapping_add(1);
                self.remaining = ticks.max(1);
                self.phase = Phase::CountingDown;
            }
            (Phase::CountingDown, GuardEvent::Tick { epoch }) if epoch == self.epoch => {
                if self.remaining > 1 {
                    self.remaining -= 1;
                } else {
                    self.remaining = 0;
                    self.phase = Phase::Triggering;
                }
            }
            (Phase::CountingDown, GuardEvent::Cancel) => {
                self.remaining = 0;
                self.phase = Phase::Idle;
            }
            (Phase::Idle | Phase::CountingDown, GuardEvent::Trigger) => {
                self.epoch = self.epoch.wrapping_add(1);
                self.remaining = 0;
                self.phase = Phase::Triggering;
            }
            (Phase::Triggering, GuardEvent::Activated) => self.phase = Phase::Active,
            (Phase::Triggering, GuardEvent::ActivationFailed) => self.phase = Phase::Idle,
            (Phase::Active, GuardEvent::BeginResolve) => self.phase = Phase::Resolving,
            (Phase::Resolving, GuardEvent::Resolved) => self.phase = Phase::Idle,
            _ => return Err(violation),
        }

        Ok(self.phase)
    }

    /// Mints the ticket for a transition that just landed in `Triggering`.
    pub(crate) fn issue_ticket(&self) -> Option<ActivationTicket> {
        (self.phase == Phase::Triggering).then_some(ActivationTicket { epoch: self.epoch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_ticks_down_then_triggers() {
        let mut state = GuardState::new();
        state.apply(GuardEvent::BeginCountdown { ticks: 5 }).unwrap();
        let epoch = state.epoch();

        let mut seen = vec![state.remaining()];
        while state.phase() == Phase::CountingDown {
            state.apply(GuardEvent::Tick { epoch }).unwrap();
            if state.phase() == Phase::CountingDown {
                seen.push(state.remaining());
            }
        }

        assert_eq!(seen, vec![5, 4, 3, 2, 1]);
        assert_eq!(state.phase(), Phase::Triggering);
        assert!(state.issue_ticket().is_some());
    }

    #[test]
    fn stale_ticks_from_an_old_countdown_are_rejected() {
        let mut state = GuardState::new();
        state.apply(GuardEvent::BeginCountdown { ticks: 5 }).unwrap();
        let old_epoch = state.epoch();
        state.apply(GuardEvent::Cancel).unwrap();
        state.apply(GuardEvent::BeginCountdown { ticks: 5 }).unwrap();

        assert!(state.apply(GuardEvent::Tick { epoch: old_epoch }).is_err());
        assert_eq!(state.remaining(), 5);
    }

    #[test]
    fn only_first_trigger_wins() {
        let mut state = GuardState::new();
        state.apply(GuardEvent::BeginCountdown { ticks: 5 }).unwrap();

        assert_eq!(state.apply(GuardEvent::Trigger), Ok(Phase::Triggering));
        let err = state.apply(GuardEvent::Trigger).unwrap_err();
        assert_eq!(err.phase, Phase::Triggering);
    }

    #[test]
    fn cancel_is_ignored_once_triggering() {
        let mut state = GuardState::new();
        state.apply(GuardEvent::Trigger).unwrap();

        assert!(state.apply(GuardEvent::Cancel).is_err());
        assert_eq!(state.phase(), Phase::Triggering);
    }

    #[test]
    fn countdown_refused_while_alert_active() {
        let mut state = GuardState::new();
        state.apply(GuardEvent::Trigger).unwrap();
        state.apply(GuardEvent::Activated).unwrap();

        assert!(state.apply(GuardEvent::BeginCountdown { ticks: 5 }).is_err());
        assert!(state.apply(GuardEvent::Trigger).is_err());
    }

    #[test]
    fn failed_activation_returns_to_idle() {
        let mut state = GuardState::new();
        state.apply(GuardEvent::Trigger).unwrap();
        state.apply(GuardEvent::ActivationFailed).unwrap();

        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.issue_ticket().is_none());
    }

    #[test]
    fn resolution_begins_once() {
        let mut state = GuardState::new();
        state.apply(GuardEvent::Trigger).unwrap();
        state.apply(GuardEvent::Activated).unwrap();

        assert!(state.apply(GuardEvent::BeginResolve).is_ok());
        assert!(state.apply(GuardEvent::BeginResolve).is_err());
        assert_eq!(state.apply(GuardEvent::Resolved), Ok(Phase::Idle));
    }
}
