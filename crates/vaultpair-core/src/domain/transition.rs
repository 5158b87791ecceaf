//! The pairing state machine's transition function.
//!
//! [`PairingState::apply`] is a pure function `(state, role, event) -> state`.
//! It is total: every combination returns either the next state (which may
//! equal the current one) or an [`InvalidTransition`] naming the combination.
//! The controller in `vaultpair-client` decides *when* events happen; this
//! module alone decides *what* they do.

use thiserror::Error;

use crate::domain::session::{PairingFailure, PairingRole, PairingState};

/// Inputs to the pairing state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// The user opened "Pair Device" (receiver) or "Share Vault" (sender).
    Start,
    /// Sender picked a discovered peer.
    PeerSelected,
    /// Receiver: the engine reports that a sender reached this device.
    PeerConnected,
    /// The engine derived a verification code from the key exchange.
    CodeIssued,
    /// The engine reports that both sides confirmed the code.
    BothConfirmed,
    /// The payload was delivered (and imported, on the receiver).
    TransferCompleted,
    /// Any failure reported by the engine, a deadline, or the import routine.
    Fault(PairingFailure),
    /// User cancel, back, or dialog close.
    Cancel,
    /// User asked to try again after a failure.
    Retry,
    /// User dismissed a finished session.
    Reset,
}

impl PairingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PairingEvent::Start => "start",
            PairingEvent::PeerSelected => "peer_selected",
            PairingEvent::PeerConnected => "peer_connected",
            PairingEvent::CodeIssued => "code_issued",
            PairingEvent::BothConfirmed => "both_confirmed",
            PairingEvent::TransferCompleted => "transfer_completed",
            PairingEvent::Fault(_) => "fault",
            PairingEvent::Cancel => "cancel",
            PairingEvent::Retry => "retry",
            PairingEvent::Reset => "reset",
        }
    }
}

/// An event that has no meaning in the current state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("event `{event}` is not valid in state `{state}` for the {role}")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: &'static str,
    pub role: PairingRole,
}

impl PairingState {
    /// The state the session enters when it starts for `role`.
    pub fn initial_for(role: PairingRole) -> PairingState {
        match role {
            PairingRole::Receiver => PairingState::Listening,
            PairingRole::Sender => PairingState::Discovering,
        }
    }

    /// Computes the next state for `event`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when `event` is not accepted in the current
    /// state for `role`.  The current state is unchanged in that case.
    pub fn apply(
        &self,
        role: PairingRole,
        event: &PairingEvent,
    ) -> Result<PairingState, InvalidTransition> {
        use PairingEvent as E;
        use PairingState as S;

        let next = match (self, event) {
            // Cancel is accepted everywhere; from Idle it is a no-op.
            (_, E::Cancel) => Some(S::Idle),

            (S::Idle, E::Reset) | (S::Success, E::Reset) | (S::Error(_), E::Reset) => {
                Some(S::Idle)
            }

            (S::Idle, E::Start) => Some(S::initial_for(role)),

            (S::Discovering, E::PeerSelected) if role == PairingRole::Sender => {
                Some(S::Connecting)
            }

            (S::Listening, E::PeerConnected) if role == PairingRole::Receiver => {
                Some(S::Connecting)
            }
            (S::Connecting, E::PeerConnected) => Some(S::Connecting),

            // A receiver may see the code before it ever observed `connecting`.
            (S::Listening, E::CodeIssued) if role == PairingRole::Receiver => Some(S::Verifying),
            (S::Connecting, E::CodeIssued) | (S::Verifying, E::CodeIssued) => Some(S::Verifying),

            (S::Verifying, E::BothConfirmed) | (S::Transferring, E::BothConfirmed) => {
                Some(S::Transferring)
            }

            (S::Transferring, E::TransferCompleted) => Some(S::Success),

            (state, E::Fault(failure)) if state.is_active() => Some(S::Error(failure.clone())),
            // The first failure is the one worth showing.
            (S::Error(existing), E::Fault(_)) => Some(S::Error(existing.clone())),

            (S::Error(failure), E::Retry) if failure.kind.is_retryable() => {
                Some(S::initial_for(role))
            }

            _ => None,
        };

        next.ok_or(InvalidTransition {
            state: self.name(),
            event: event.name(),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::FailureKind;

    const ROLES: [PairingRole; 2] = [PairingRole::Sender, PairingRole::Receiver];

    fn failure(kind: FailureKind) -> PairingFailure {
        PairingFailure::new(kind, "boom")
    }

    fn all_states() -> Vec<PairingState> {
        vec![
            PairingState::Idle,
            PairingState::Listening,
            PairingState::Discovering,
            PairingState::Connecting,
            PairingState::Verifying,
            PairingState::Transferring,
            PairingState::Success,
            PairingState::Error(failure(FailureKind::Transfer)),
            PairingState::Error(failure(FailureKind::Import)),
        ]
    }

    fn all_events() -> Vec<PairingEvent> {
        vec![
            PairingEvent::Start,
            PairingEvent::PeerSelected,
            PairingEvent::PeerConnected,
            PairingEvent::CodeIssued,
            PairingEvent::BothConfirmed,
            PairingEvent::TransferCompleted,
            PairingEvent::Fault(failure(FailureKind::Connection)),
            PairingEvent::Cancel,
            PairingEvent::Retry,
            PairingEvent::Reset,
        ]
    }

    #[test]
    fn test_every_state_event_pair_is_decided() {
        // Each pair either moves somewhere or reports exactly which pair was rejected.
        for role in ROLES {
            for state in all_states() {
                for event in all_events() {
                    match state.apply(role, &event) {
                        Ok(_) => {}
                        Err(e) => {
                            assert_eq!(e.state, state.name());
                            assert_eq!(e.event, event.name());
                            assert_eq!(e.role, role);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_cancel_returns_to_idle_from_every_state() {
        for role in ROLES {
            for state in all_states() {
                assert_eq!(
                    state.apply(role, &PairingEvent::Cancel),
                    Ok(PairingState::Idle),
                    "cancel from {state} as {role}"
                );
            }
        }
    }

    #[test]
    fn test_start_depends_on_role() {
        assert_eq!(
            PairingState::Idle.apply(PairingRole::Receiver, &PairingEvent::Start),
            Ok(PairingState::Listening)
        );
        assert_eq!(
            PairingState::Idle.apply(PairingRole::Sender, &PairingEvent::Start),
            Ok(PairingState::Discovering)
        );
    }

    #[test]
    fn test_start_rejected_while_session_active() {
        let result = PairingState::Verifying.apply(PairingRole::Sender, &PairingEvent::Start);
        assert!(result.is_err());
    }

    #[test]
    fn test_receiver_cannot_select_peer() {
        let result =
            PairingState::Discovering.apply(PairingRole::Receiver, &PairingEvent::PeerSelected);
        assert!(result.is_err());
    }

    #[test]
    fn test_sender_full_path_reaches_success() {
        let role = PairingRole::Sender;
        let mut state = PairingState::Idle;
        for event in [
            PairingEvent::Start,
            PairingEvent::PeerSelected,
            PairingEvent::CodeIssued,
            PairingEvent::BothConfirmed,
            PairingEvent::TransferCompleted,
        ] {
            state = state.apply(role, &event).expect("documented transition");
        }
        assert_eq!(state, PairingState::Success);
    }

    #[test]
    fn test_receiver_full_path_reaches_success() {
        let role = PairingRole::Receiver;
        let mut state = PairingState::Idle;
        for event in [
            PairingEvent::Start,
            PairingEvent::PeerConnected,
            PairingEvent::CodeIssued,
            PairingEvent::BothConfirmed,
            PairingEvent::TransferCompleted,
        ] {
            state = state.apply(role, &event).expect("documented transition");
        }
        assert_eq!(state, PairingState::Success);
    }

    #[test]
    fn test_transferring_requires_verifying_first() {
        let result =
            PairingState::Connecting.apply(PairingRole::Sender, &PairingEvent::BothConfirmed);
        assert!(result.is_err());
    }

    #[test]
    fn test_fault_from_active_state_enters_error() {
        let f = failure(FailureKind::Verification);
        let next = PairingState::Verifying
            .apply(PairingRole::Receiver, &PairingEvent::Fault(f.clone()))
            .unwrap();
        assert_eq!(next, PairingState::Error(f));
    }

    #[test]
    fn test_second_fault_keeps_first_failure() {
        let first = failure(FailureKind::Timeout);
        let state = PairingState::Error(first.clone());
        let next = state
            .apply(
                PairingRole::Sender,
                &PairingEvent::Fault(failure(FailureKind::Connection)),
            )
            .unwrap();
        assert_eq!(next, PairingState::Error(first));
    }

    #[test]
    fn test_fault_after_success_is_rejected() {
        let result = PairingState::Success.apply(
            PairingRole::Receiver,
            &PairingEvent::Fault(failure(FailureKind::Transfer)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_retry_restarts_in_role_initial_state() {
        let state = PairingState::Error(failure(FailureKind::Connection));
        assert_eq!(
            state.apply(PairingRole::Sender, &PairingEvent::Retry),
            Ok(PairingState::Discovering)
        );
        assert_eq!(
            state.apply(PairingRole::Receiver, &PairingEvent::Retry),
            Ok(PairingState::Listening)
        );
    }

    #[test]
    fn test_retry_after_import_failure_is_rejected() {
        let state = PairingState::Error(failure(FailureKind::Import));
        assert!(state.apply(PairingRole::Receiver, &PairingEvent::Retry).is_err());
    }

    #[test]
    fn test_reset_only_from_finished_states() {
        assert_eq!(
            PairingState::Success.apply(PairingRole::Sender, &PairingEvent::Reset),
            Ok(PairingState::Idle)
        );
        assert!(PairingState::Transferring
            .apply(PairingRole::Sender, &PairingEvent::Reset)
            .is_err());
    }
}
