//! Transition table for existing sessions
//!
//! Session creation (absent -> Ringing) and invitation retransmissions are
//! handled by the state machine itself; everything else goes through here.

use super::types::{CallId, CallState, HostCommand, SessionEventKind};

/// Side effect attached to a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ActivateAudioPath,
    TeardownAudioPath,
    NotifyRemoteDeclined,
    NotifyTimeout,
    SessionClosed,
    ToggleMute,
}

impl Effect {
    pub fn into_command(self, call_id: &CallId) -> HostCommand {
        let call_id = call_id.clone();
        match self {
            Effect::ActivateAudioPath => HostCommand::ActivateAudioPath { call_id },
            Effect::TeardownAudioPath => HostCommand::TeardownAudioPath { call_id },
            Effect::NotifyRemoteDeclined => HostCommand::NotifyRemoteDeclined { call_id },
            Effect::NotifyTimeout => HostCommand::NotifyTimeout { call_id },
            Effect::SessionClosed => HostCommand::SessionClosed { call_id },
            Effect::ToggleMute => HostCommand::ToggleMute { call_id },
        }
    }
}

/// Next state and side effect for `event` in `state`, or `None` if the event
/// does not apply
pub fn lookup(state: CallState, event: SessionEventKind) -> Option<(CallState, Effect)> {
    use CallState::*;
    use SessionEventKind::*;

    match (state, event) {
        (Ringing, AcceptRequested) => Some((Active, Effect::ActivateAudioPath)),
        (Ringing, DeclineRequested) => Some((Ended, Effect::NotifyRemoteDeclined)),
        (Ringing, Timeout) => Some((Ended, Effect::NotifyTimeout)),
        (Active, EndRequested) => Some((Ending, Effect::TeardownAudioPath)),
        (Active, MuteToggleRequested) => Some((Active, Effect::ToggleMute)),
        (Ending, TeardownConfirmed) => Some((Ended, Effect::SessionClosed)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [CallState; 4] = [CallState::Ringing, CallState::Active, CallState::Ending, CallState::Ended];
    const EVENTS: [SessionEventKind; 7] = [
        SessionEventKind::InvitationReceived,
        SessionEventKind::AcceptRequested,
        SessionEventKind::DeclineRequested,
        SessionEventKind::Timeout,
        SessionEventKind::EndRequested,
        SessionEventKind::TeardownConfirmed,
        SessionEventKind::MuteToggleRequested,
    ];

    fn order(state: CallState) -> u8 {
        match state {
            CallState::Ringing => 0,
            CallState::Active => 1,
            CallState::Ending => 2,
            CallState::Ended => 3,
        }
    }

    #[test]
    fn test_table_only_moves_forward() {
        for state in STATES {
            for event in EVENTS {
                if let Some((next, _)) = lookup(state, event) {
                    assert!(order(next) >= order(state), "{:?} --{:?}--> {:?} goes backwards", state, event, next);
                }
            }
        }
    }

    #[test]
    fn test_ringing_never_jumps_to_ending() {
        for event in EVENTS {
            assert_ne!(lookup(CallState::Ringing, event).map(|(s, _)| s), Some(CallState::Ending));
        }
    }

    #[test]
    fn test_ended_is_terminal() {
        for event in EVENTS {
            assert!(lookup(CallState::Ended, event).is_none());
        }
    }

    #[test]
    fn test_invitation_never_in_table() {
        for state in STATES {
            assert!(lookup(state, SessionEventKind::InvitationReceived).is_none());
        }
    }

    #[test]
    fn test_timeout_after_accept_rejected() {
        assert!(lookup(CallState::Active, SessionEventKind::Timeout).is_none());
    }
}
