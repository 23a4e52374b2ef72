//! # Softphone Bridge Core
//!
//! Turns out-of-band softphone events into a consistent, race-free view of each
//! call and tells the host surface what to do about it:
//!
//! - **push**: the push token lifecycle that gates whether calls can be delivered
//! - **network**: deterministic selection of the interface outbound signaling binds to
//! - **session**: the per-call state machine driven by invitations, host actions and timers
//! - **dispatcher**: host and notification actions mapped onto session events
//! - **bridge**: the composition root wiring everything together
//!
//! ## Call flow
//!
//! ```text
//! push invitation -> SignalingBridge -> CallSessionStateMachine -> PresentIncomingCall
//! host accept     -> CallActionDispatcher -> CallSessionStateMachine -> ActivateAudioPath
//! ```
//!
//! Outbound effects never call into the host. They are queued as [`HostCommand`]s
//! in transition order and the host drains them from a [`CommandReceiver`].
//!
//! See [`bridge`] for a complete example.

pub mod bridge;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod network;
pub mod push;
pub mod session;

pub use bridge::{ShutdownSummary, SignalingBridge, SignalingBridgeBuilder};
pub use commands::{command_queue, CommandReceiver, CommandSender, CommandSink};
pub use config::BridgeConfig;
pub use dispatcher::{active_call_category, CallAction, CallActionDispatcher, NotificationAction, NotificationCategory};
pub use errors::{BridgeError, PathError, Result, SessionError};
pub use network::{
    FixedInterfaces, InterfaceEnumerator, NetworkPath, NetworkPathSelector, PathKind, SystemInterfaces,
    TransportBinding, TransportKind,
};
pub use push::{DeliveryRegistrar, PushToken, PushTokenLifecycle, TokenEvent};
pub use session::{
    CallId, CallInvitation, CallSession, CallSessionStateMachine, CallState, HostCommand, MachineConfig,
    SessionEventKind, SessionStats, Transition,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
