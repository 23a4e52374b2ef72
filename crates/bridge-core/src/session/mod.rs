//! Call sessions driven by push invitations and host actions

pub mod state_machine;
pub mod table;
pub mod types;

pub use state_machine::{CallSessionStateMachine, MachineConfig, PathSource};
pub use types::{
    CallId, CallInvitation, CallSession, CallState, HostCommand, SessionEventKind, SessionStats, Transition,
};
