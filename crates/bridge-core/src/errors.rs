//! Error types for the signaling bridge
//!
//! Nothing here is fatal: every variant is a typed rejection that leaves the
//! affected component in the state it was in before the call.

use thiserror::Error;

use crate::session::types::{CallId, CallState, SessionEventKind};

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Rejections produced by the call session state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The event does not apply to the session's current state
    #[error("Invalid transition for call {call_id}: {event:?} in state {state:?}")]
    InvalidTransition {
        call_id: CallId,
        state: CallState,
        event: SessionEventKind,
    },

    /// No session exists for the call (never created or already evicted)
    #[error("Unknown call: {call_id}")]
    UnknownCall { call_id: CallId },

    /// An invitation reused the id of a call that already ended
    #[error("Duplicate call: {call_id} already ended")]
    DuplicateCall { call_id: CallId },

    /// Too many concurrent sessions to accept another invitation
    #[error("Concurrent session limit of {limit} reached")]
    CapacityExceeded { limit: usize },

    /// The caller closed admission of new sessions for this invitation
    #[error("New sessions are not admitted; refusing call {call_id}")]
    NotAdmitted { call_id: CallId },
}

impl SessionError {
    pub fn invalid_transition(call_id: &CallId, state: CallState, event: SessionEventKind) -> Self {
        Self::InvalidTransition {
            call_id: call_id.clone(),
            state,
            event,
        }
    }

    pub fn unknown_call(call_id: &CallId) -> Self {
        Self::UnknownCall {
            call_id: call_id.clone(),
        }
    }

    pub fn duplicate_call(call_id: &CallId) -> Self {
        Self::DuplicateCall {
            call_id: call_id.clone(),
        }
    }

    pub fn not_admitted(call_id: &CallId) -> Self {
        Self::NotAdmitted {
            call_id: call_id.clone(),
        }
    }

    /// Whether the host should treat this rejection as a silent no-op
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::UnknownCall { .. } | Self::DuplicateCall { .. })
    }
}

/// Failures of network path selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// No candidate survived filtering; retry on the next network change
    #[error("No usable network path")]
    NoUsablePath,

    /// The interface enumeration facility failed
    #[error("Interface enumeration failed: {message}")]
    Enumeration { message: String },
}

impl PathError {
    pub fn enumeration(message: impl Into<String>) -> Self {
        Self::Enumeration {
            message: message.into(),
        }
    }
}

/// Top-level error for the composition root
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Path(#[from] PathError),

    /// Invitation arrived while push delivery is not registered
    #[error("Push delivery not registered; refusing call {call_id}")]
    PushNotRegistered { call_id: CallId },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Infra(#[from] softphone_infra_common::Error),
}

impl BridgeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
