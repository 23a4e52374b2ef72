//! Call session state machine
//!
//! ```text
//!  (absent) --InvitationReceived--> Ringing --AcceptRequested--> Active --EndRequested--> Ending
//!                                      |                                                     |
//!                                      +--DeclineRequested / Timeout--> Ended <--TeardownConfirmed
//! ```
//!
//! Every call id owns one cell behind a `tokio` mutex. Events for the same call
//! are applied one at a time in lock acquisition order; different calls never
//! contend. Host commands are emitted while the cell lock is held, so the
//! command stream for a call follows its transitions exactly.
//!
//! Ended sessions stay in the table for a grace window so late retransmissions
//! are recognised, then they are evicted and the call id becomes unknown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use super::table;
use super::types::{
    CallId, CallInvitation, CallSession, CallState, HostCommand, SessionEventKind, SessionStats, Transition,
};
use crate::commands::CommandSink;
use crate::errors::SessionError;
use crate::network::NetworkPath;

/// Provides the path snapshot recorded when a call is accepted
pub trait PathSource: Send + Sync {
    fn current_path(&self) -> Option<NetworkPath>;
}

/// Timing and capacity policy of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Automatic ring timeout; `None` leaves timeouts to the host
    pub ring_timeout: Option<Duration>,
    /// How long ended sessions are kept to absorb duplicates
    pub terminal_grace: Duration,
    /// Maximum number of non-ended sessions
    pub max_sessions: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Some(Duration::from_secs(45)),
            terminal_grace: Duration::from_secs(30),
            max_sessions: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Host,
    Timer,
}

#[derive(Default)]
struct SessionCell {
    session: Option<CallSession>,
    ring_timer: Option<JoinHandle<()>>,
    /// Set once the cell has left the table; holders must look the call up again
    evicted: bool,
}

type CellRef = Arc<Mutex<SessionCell>>;

struct MachineInner {
    sessions: DashMap<CallId, CellRef>,
    sink: Arc<dyn CommandSink>,
    path_source: Option<Arc<dyn PathSource>>,
    config: MachineConfig,
    live: AtomicUsize,
}

/// Decision engine turning call events into state transitions and host commands
#[derive(Clone)]
pub struct CallSessionStateMachine {
    inner: Arc<MachineInner>,
}

impl CallSessionStateMachine {
    pub fn new(
        config: MachineConfig,
        sink: Arc<dyn CommandSink>,
        path_source: Option<Arc<dyn PathSource>>,
    ) -> Self {
        Self {
            inner: Arc::new(MachineInner {
                sessions: DashMap::new(),
                sink,
                path_source,
                config,
                live: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.inner.config
    }

    /// Create a Ringing session for a new call id.
    ///
    /// A retransmission for a live session is an idempotent no-op
    /// (`duplicate: true`); one for an ended session still inside its grace
    /// window fails with `DuplicateCall`.
    pub async fn handle_invitation(
        &self,
        invitation: CallInvitation,
        path: Option<NetworkPath>,
    ) -> Result<Transition, SessionError> {
        self.handle_invitation_admitting(invitation, path, true).await
    }

    /// Like [`handle_invitation`](Self::handle_invitation), but a call id with
    /// no session yet is refused with `NotAdmitted` unless `admit_new` is set.
    /// Retransmissions for tracked calls are answered either way.
    pub async fn handle_invitation_admitting(
        &self,
        invitation: CallInvitation,
        path: Option<NetworkPath>,
        admit_new: bool,
    ) -> Result<Transition, SessionError> {
        let call_id = invitation.call_id.clone();

        loop {
            let existing = self.inner.sessions.get(&call_id).map(|entry| entry.value().clone());
            let Some(cell) = existing else {
                // A fresh cell is locked before it becomes visible, so creation
                // completes without yielding once it is in the table.
                let fresh = CellRef::default();
                let Ok(mut guard) = fresh.try_lock() else { continue };
                match self.inner.sessions.entry(call_id.clone()) {
                    Entry::Occupied(_) => continue,
                    Entry::Vacant(slot) => {
                        slot.insert(fresh.clone());
                    }
                }
                return self.create_session(&fresh, &mut guard, invitation, path, admit_new);
            };

            let mut guard = cell.lock().await;
            if guard.evicted {
                continue;
            }

            let Some(state) = guard.session.as_ref().map(|session| session.state) else {
                return self.create_session(&cell, &mut guard, invitation, path, admit_new);
            };
            if state.is_terminal() {
                debug!(%call_id, "Invitation for ended call rejected");
                return Err(SessionError::duplicate_call(&call_id));
            }
            debug!(%call_id, ?state, "Invitation retransmission ignored");
            return Ok(Transition {
                call_id,
                from: Some(state),
                to: state,
                duplicate: true,
            });
        }
    }

    /// Fill an empty, locked cell; a refused invitation takes its cell out of the table
    fn create_session(
        &self,
        cell: &CellRef,
        slot: &mut SessionCell,
        invitation: CallInvitation,
        path: Option<NetworkPath>,
        admit_new: bool,
    ) -> Result<Transition, SessionError> {
        let call_id = invitation.call_id.clone();

        if !admit_new {
            self.discard(cell, slot, &call_id);
            debug!(%call_id, "Invitation for new call not admitted");
            return Err(SessionError::not_admitted(&call_id));
        }
        if !self.reserve_slot() {
            self.discard(cell, slot, &call_id);
            warn!(%call_id, limit = self.inner.config.max_sessions, "Refusing invitation, session limit reached");
            return Err(SessionError::CapacityExceeded {
                limit: self.inner.config.max_sessions,
            });
        }

        slot.session = Some(CallSession::ringing(invitation.clone()));
        self.inner.sink.emit(HostCommand::PresentIncomingCall {
            call_id: call_id.clone(),
            invitation,
            path,
        });
        slot.ring_timer = self.start_ring_timer(&call_id);
        info!(%call_id, "Incoming call ringing");

        Ok(Transition {
            call_id,
            from: None,
            to: CallState::Ringing,
            duplicate: false,
        })
    }

    fn discard(&self, cell: &CellRef, slot: &mut SessionCell, call_id: &CallId) {
        slot.evicted = true;
        self.inner.sessions.remove_if(call_id, |_, current| Arc::ptr_eq(current, cell));
    }

    pub async fn accept(&self, call_id: &CallId) -> Result<Transition, SessionError> {
        self.apply(call_id, SessionEventKind::AcceptRequested, Origin::Host).await
    }

    pub async fn decline(&self, call_id: &CallId) -> Result<Transition, SessionError> {
        self.apply(call_id, SessionEventKind::DeclineRequested, Origin::Host).await
    }

    pub async fn timeout(&self, call_id: &CallId) -> Result<Transition, SessionError> {
        self.apply(call_id, SessionEventKind::Timeout, Origin::Host).await
    }

    pub async fn end(&self, call_id: &CallId) -> Result<Transition, SessionError> {
        self.apply(call_id, SessionEventKind::EndRequested, Origin::Host).await
    }

    pub async fn confirm_teardown(&self, call_id: &CallId) -> Result<Transition, SessionError> {
        self.apply(call_id, SessionEventKind::TeardownConfirmed, Origin::Host).await
    }

    pub async fn toggle_mute(&self, call_id: &CallId) -> Result<Transition, SessionError> {
        self.apply(call_id, SessionEventKind::MuteToggleRequested, Origin::Host).await
    }

    async fn apply(
        &self,
        call_id: &CallId,
        event: SessionEventKind,
        origin: Origin,
    ) -> Result<Transition, SessionError> {
        loop {
            let cell = match self.inner.sessions.get(call_id) {
                Some(entry) => entry.value().clone(),
                None => {
                    debug!(%call_id, ?event, "Event for unknown call");
                    return Err(SessionError::unknown_call(call_id));
                }
            };
            let mut guard = cell.lock().await;
            if guard.evicted {
                continue;
            }

            let cell_state = &mut *guard;
            let Some(session) = cell_state.session.as_mut() else {
                return Err(SessionError::unknown_call(call_id));
            };

            let from = session.state;
            let Some((to, effect)) = table::lookup(from, event) else {
                match origin {
                    Origin::Timer => debug!(%call_id, state = ?from, "Ring timeout lost the race"),
                    Origin::Host => debug!(%call_id, state = ?from, ?event, "Rejected inapplicable event"),
                }
                return Err(SessionError::invalid_transition(call_id, from, event));
            };

            if from == CallState::Ringing && to != CallState::Ringing {
                if let Some(timer) = cell_state.ring_timer.take() {
                    // The timer task must not abort itself mid-transition.
                    if origin != Origin::Timer {
                        timer.abort();
                    }
                }
            }

            session.move_to(to);
            if event == SessionEventKind::AcceptRequested {
                session.path = self.inner.path_source.as_ref().and_then(|source| source.current_path());
            }
            self.inner.sink.emit(effect.into_command(call_id));
            info!(%call_id, from = ?from, to = ?to, ?event, "Call state transition");

            if to.is_terminal() {
                self.inner.live.fetch_sub(1, Ordering::AcqRel);
                self.schedule_eviction(call_id.clone(), cell.clone());
            }

            return Ok(Transition {
                call_id: call_id.clone(),
                from: Some(from),
                to,
                duplicate: false,
            });
        }
    }

    fn reserve_slot(&self) -> bool {
        let limit = self.inner.config.max_sessions;
        self.inner
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| (live < limit).then_some(live + 1))
            .is_ok()
    }

    fn start_ring_timer(&self, call_id: &CallId) -> Option<JoinHandle<()>> {
        let ring_timeout = self.inner.config.ring_timeout?;
        let inner = Arc::downgrade(&self.inner);
        let call_id = call_id.clone();

        let span = info_span!("ring_timer", %call_id, timeout_secs = ring_timeout.as_secs());

        Some(tokio::spawn(
            async move {
                tokio::time::sleep(ring_timeout).await;
                let Some(inner) = inner.upgrade() else { return };
                let machine = CallSessionStateMachine { inner };
                match machine.apply(&call_id, SessionEventKind::Timeout, Origin::Timer).await {
                    Ok(_) => info!(%call_id, "Ring timeout fired"),
                    Err(e) => debug!(%call_id, "Ring timeout discarded: {}", e),
                }
            }
            .instrument(span),
        ))
    }

    fn schedule_eviction(&self, call_id: CallId, cell: CellRef) {
        let grace = self.inner.config.terminal_grace;
        let inner = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let Some(inner) = inner.upgrade() else { return };
            let mut guard = cell.lock().await;
            if guard.evicted {
                return;
            }
            guard.evicted = true;
            inner.sessions.remove_if(&call_id, |_, current| Arc::ptr_eq(current, &cell));
            debug!(%call_id, "Evicted ended session");
        });
    }

    /// Snapshot of one session, if it is still tracked
    pub async fn session(&self, call_id: &CallId) -> Option<CallSession> {
        let cell = self.inner.sessions.get(call_id)?.value().clone();
        let guard = cell.lock().await;
        if guard.evicted {
            return None;
        }
        guard.session.clone()
    }

    /// Snapshots of every tracked session, ended ones included
    pub async fn sessions(&self) -> Vec<CallSession> {
        let cells: Vec<CellRef> = self.inner.sessions.iter().map(|entry| entry.value().clone()).collect();

        let mut sessions = Vec::with_capacity(cells.len());
        for cell in cells {
            let guard = cell.lock().await;
            if guard.evicted {
                continue;
            }
            if let Some(session) = &guard.session {
                sessions.push(session.clone());
            }
        }
        sessions
    }

    pub async fn stats(&self) -> SessionStats {
        let mut stats = SessionStats::default();
        for session in self.sessions().await {
            stats.total += 1;
            match session.state {
                CallState::Ringing => stats.ringing += 1,
                CallState::Active => stats.active += 1,
                CallState::Ending => stats.ending += 1,
                CallState::Ended => stats.ended += 1,
            }
        }
        stats
    }

    /// Number of sessions that have not ended
    pub fn live_sessions(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Number of call ids with a cell in the table, ended sessions included
    pub fn tracked_calls(&self) -> usize {
        self.inner.sessions.len()
    }
}
