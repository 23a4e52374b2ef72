//! Call session data model

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::network::NetworkPath;

/// Identifier of one call attempt, unique for its lifetime
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CallId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Call invitation delivered by the push subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallInvitation {
    pub call_id: CallId,
    pub caller_display_name: String,
    pub caller_handle: String,
    pub is_video: bool,
    /// Opaque payload forwarded untouched to the presentation layer
    #[serde(default)]
    pub raw_extra: BTreeMap<String, serde_json::Value>,
}

impl CallInvitation {
    pub fn new(
        call_id: impl Into<CallId>,
        caller_display_name: impl Into<String>,
        caller_handle: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            caller_display_name: caller_display_name.into(),
            caller_handle: caller_handle.into(),
            is_video: false,
            raw_extra: BTreeMap::new(),
        }
    }

    pub fn with_video(mut self) -> Self {
        self.is_video = true;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.raw_extra.insert(key.into(), value);
        self
    }
}

/// Stored session states. "Idle" is the absence of a session.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CallState {
    Ringing,
    Active,
    Ending,
    Ended,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Events applied to an existing session
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SessionEventKind {
    InvitationReceived,
    AcceptRequested,
    DeclineRequested,
    Timeout,
    EndRequested,
    TeardownConfirmed,
    MuteToggleRequested,
}

/// Tracked lifecycle of one call attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    pub call_id: CallId,
    pub state: CallState,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    pub invitation: CallInvitation,
    /// Path bound when the call was accepted; informational only
    pub path: Option<NetworkPath>,
}

impl CallSession {
    pub(crate) fn ringing(invitation: CallInvitation) -> Self {
        let now = Utc::now();
        Self {
            call_id: invitation.call_id.clone(),
            state: CallState::Ringing,
            created_at: now,
            last_transition_at: now,
            invitation,
            path: None,
        }
    }

    pub(crate) fn move_to(&mut self, state: CallState) {
        self.state = state;
        self.last_transition_at = Utc::now();
    }
}

/// Outbound command for the host telephony/UI surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    /// Show an incoming-call affordance
    PresentIncomingCall {
        call_id: CallId,
        invitation: CallInvitation,
        path: Option<NetworkPath>,
    },
    /// Configure the audio session for the call
    ActivateAudioPath { call_id: CallId },
    /// Release the audio session; answer with a teardown confirmation
    TeardownAudioPath { call_id: CallId },
    NotifyRemoteDeclined { call_id: CallId },
    NotifyTimeout { call_id: CallId },
    SessionClosed { call_id: CallId },
    /// Flip the microphone mute state of an active call
    ToggleMute { call_id: CallId },
}

impl HostCommand {
    pub fn call_id(&self) -> &CallId {
        match self {
            HostCommand::PresentIncomingCall { call_id, .. }
            | HostCommand::ActivateAudioPath { call_id }
            | HostCommand::TeardownAudioPath { call_id }
            | HostCommand::NotifyRemoteDeclined { call_id }
            | HostCommand::NotifyTimeout { call_id }
            | HostCommand::SessionClosed { call_id }
            | HostCommand::ToggleMute { call_id } => call_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::PresentIncomingCall { .. } => "PresentIncomingCall",
            HostCommand::ActivateAudioPath { .. } => "ActivateAudioPath",
            HostCommand::TeardownAudioPath { .. } => "TeardownAudioPath",
            HostCommand::NotifyRemoteDeclined { .. } => "NotifyRemoteDeclined",
            HostCommand::NotifyTimeout { .. } => "NotifyTimeout",
            HostCommand::SessionClosed { .. } => "SessionClosed",
            HostCommand::ToggleMute { .. } => "ToggleMute",
        }
    }
}

/// Result of an applied (or idempotently ignored) event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub call_id: CallId,
    /// `None` when the session was just created
    pub from: Option<CallState>,
    pub to: CallState,
    /// The event was a retransmission and changed nothing
    pub duplicate: bool,
}

/// Session counts by state
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub ringing: usize,
    pub active: usize,
    pub ending: usize,
    pub ended: usize,
}
