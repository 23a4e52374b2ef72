//! Host and timer actions
//!
//! [`CallActionDispatcher`] turns what the host surface (or a timer) asks for into
//! state machine events and reports the resulting state. Commands produced by the
//! transition land on the host command queue; the dispatcher itself never calls
//! back into the host.
//!
//! Rejections are returned as [`SessionError`]. `UnknownCall` and `DuplicateCall`
//! are expected under normal races and should be treated as silent no-ops
//! (see [`SessionError::is_silent`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::SessionError;
use crate::session::{CallId, CallSessionStateMachine, CallState, Transition};

/// Notification category the host registers for ongoing calls
pub const ACTIVE_CALL_CATEGORY: &str = "active_call";

/// Action requested by the host or a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallAction {
    Accept,
    Decline,
    End,
    Timeout,
    TeardownConfirmed,
}

impl fmt::Display for CallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Buttons of the active-call notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationAction {
    Mute,
    Hangup,
}

impl NotificationAction {
    pub fn identifier(&self) -> &'static str {
        match self {
            NotificationAction::Mute => "MUTE_ACTION",
            NotificationAction::Hangup => "HANGUP_ACTION",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationAction::Mute => "Mute/Unmute",
            NotificationAction::Hangup => "Hang Up",
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(self, NotificationAction::Hangup)
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "MUTE_ACTION" => Some(NotificationAction::Mute),
            "HANGUP_ACTION" => Some(NotificationAction::Hangup),
            _ => None,
        }
    }
}

/// Notification category description for host registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationCategory {
    pub identifier: &'static str,
    pub actions: Vec<NotificationAction>,
}

pub fn active_call_category() -> NotificationCategory {
    NotificationCategory {
        identifier: ACTIVE_CALL_CATEGORY,
        actions: vec![NotificationAction::Mute, NotificationAction::Hangup],
    }
}

#[derive(Clone)]
pub struct CallActionDispatcher {
    machine: CallSessionStateMachine,
}

impl CallActionDispatcher {
    pub fn new(machine: CallSessionStateMachine) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &CallSessionStateMachine {
        &self.machine
    }

    pub async fn accept(&self, call_id: &CallId) -> Result<CallState, SessionError> {
        self.dispatch(call_id, CallAction::Accept).await
    }

    pub async fn decline(&self, call_id: &CallId) -> Result<CallState, SessionError> {
        self.dispatch(call_id, CallAction::Decline).await
    }

    pub async fn end(&self, call_id: &CallId) -> Result<CallState, SessionError> {
        self.dispatch(call_id, CallAction::End).await
    }

    pub async fn timeout(&self, call_id: &CallId) -> Result<CallState, SessionError> {
        self.dispatch(call_id, CallAction::Timeout).await
    }

    /// The host finished releasing the audio path of an ending call
    pub async fn teardown_confirmed(&self, call_id: &CallId) -> Result<CallState, SessionError> {
        self.dispatch(call_id, CallAction::TeardownConfirmed).await
    }

    pub async fn dispatch(&self, call_id: &CallId, action: CallAction) -> Result<CallState, SessionError> {
        let result = match action {
            CallAction::Accept => self.machine.accept(call_id).await,
            CallAction::Decline => self.machine.decline(call_id).await,
            CallAction::End => self.machine.end(call_id).await,
            CallAction::Timeout => self.machine.timeout(call_id).await,
            CallAction::TeardownConfirmed => self.machine.confirm_teardown(call_id).await,
        };
        report(call_id, &action.to_string(), result)
    }

    /// Handle a tap on an active-call notification button.
    ///
    /// Unknown identifiers are ignored and reported as `Ok(None)`.
    pub async fn notification_action(
        &self,
        call_id: &CallId,
        identifier: &str,
    ) -> Result<Option<CallState>, SessionError> {
        let Some(action) = NotificationAction::from_identifier(identifier) else {
            warn!(%call_id, identifier, "Ignoring unknown notification action");
            return Ok(None);
        };

        let state = match action {
            NotificationAction::Hangup => self.end(call_id).await?,
            NotificationAction::Mute => report(call_id, "Mute", self.machine.toggle_mute(call_id).await)?,
        };
        Ok(Some(state))
    }
}

fn report(call_id: &CallId, action: &str, result: Result<Transition, SessionError>) -> Result<CallState, SessionError> {
    match result {
        Ok(transition) => Ok(transition.to),
        Err(e) if e.is_silent() => {
            debug!(%call_id, action, "Action ignored: {}", e);
            Err(e)
        }
        Err(e) => {
            warn!(%call_id, action, "Action rejected: {}", e);
            Err(e)
        }
    }
}
