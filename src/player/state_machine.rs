use thiserror::Error;

/// Phases of one player's poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    /// Not polling; waiting for a trigger.
    Idle,
    /// A timeline poll is in flight.
    Polling,
    /// The last poll reported a playing or paused stream.
    Active,
    /// The last poll failed or reported nothing playing.
    Stalled,
    /// Too many consecutive failures; the subtree has been emptied.
    Disconnected,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A poll cycle starts.
    Start,
    /// The poll succeeded; `live` tells whether a stream is playing or paused.
    Observed {
        /// Whether the active stream is not stopped.
        live: bool,
    },
    /// The poll timed out or the device was unreachable.
    Failed,
    /// The retry budget is exhausted.
    GiveUp,
    /// The player was seen again after a disconnect.
    Reset,
    /// The loop is shutting down.
    Stop,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: PlayerPhase,
    /// The event that cannot be applied from this phase.
    pub event: PlayerEvent,
}

/// State machine tracking the poll loop of one player.
#[derive(Debug, Clone)]
pub struct PlayerStateMachine {
    phase: PlayerPhase,
    version: usize,
}

impl Default for PlayerStateMachine {
    fn default() -> Self {
        Self {
            phase: PlayerPhase::Idle,
            version: 0,
        }
    }
}

impl PlayerStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: PlayerEvent) -> Result<PlayerPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    fn compute_transition(&self, event: PlayerEvent) -> Result<PlayerPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (PlayerPhase::Idle | PlayerPhase::Active | PlayerPhase::Stalled, PlayerEvent::Start) => {
                PlayerPhase::Polling
            }
            (PlayerPhase::Polling, PlayerEvent::Observed { live: true }) => PlayerPhase::Active,
            (PlayerPhase::Polling, PlayerEvent::Observed { live: false }) => PlayerPhase::Stalled,
            (PlayerPhase::Polling, PlayerEvent::Failed) => PlayerPhase::Stalled,
            (PlayerPhase::Stalled, PlayerEvent::GiveUp) => PlayerPhase::Disconnected,
            (PlayerPhase::Disconnected, PlayerEvent::Reset) => PlayerPhase::Idle,
            (_, PlayerEvent::Stop) => PlayerPhase::Idle,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut PlayerStateMachine, event: PlayerEvent) -> PlayerPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_idle() {
        assert_eq!(PlayerStateMachine::new().phase(), PlayerPhase::Idle);
    }

    #[test]
    fn poll_cycle_round_trip() {
        let mut sm = PlayerStateMachine::new();
        assert_eq!(apply(&mut sm, PlayerEvent::Start), PlayerPhase::Polling);
        assert_eq!(
            apply(&mut sm, PlayerEvent::Observed { live: true }),
            PlayerPhase::Active
        );
        assert_eq!(apply(&mut sm, PlayerEvent::Start), PlayerPhase::Polling);
        assert_eq!(
            apply(&mut sm, PlayerEvent::Observed { live: false }),
            PlayerPhase::Stalled
        );
        assert_eq!(sm.version(), 4);
    }

    #[test]
    fn failures_lead_to_disconnect_then_idle() {
        let mut sm = PlayerStateMachine::new();
        apply(&mut sm, PlayerEvent::Start);
        assert_eq!(apply(&mut sm, PlayerEvent::Failed), PlayerPhase::Stalled);
        assert_eq!(apply(&mut sm, PlayerEvent::GiveUp), PlayerPhase::Disconnected);
        assert_eq!(apply(&mut sm, PlayerEvent::Reset), PlayerPhase::Idle);
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = PlayerStateMachine::new();
        let err = sm.apply(PlayerEvent::GiveUp).unwrap_err();
        assert_eq!(err.from, PlayerPhase::Idle);
        assert_eq!(err.event, PlayerEvent::GiveUp);
        assert_eq!(sm.phase(), PlayerPhase::Idle);
    }

    #[test]
    fn stop_is_always_accepted() {
        let mut sm = PlayerStateMachine::new();
        apply(&mut sm, PlayerEvent::Start);
        assert_eq!(apply(&mut sm, PlayerEvent::Stop), PlayerPhase::Idle);
    }
}
