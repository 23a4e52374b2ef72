//! Signaling bridge composition root
//!
//! [`SignalingBridge`] owns one instance of each core component and is the only
//! place that knows about the external collaborators:
//!
//! - the push subsystem feeds [`on_token_issued`](SignalingBridge::on_token_issued),
//!   [`on_token_invalidated`](SignalingBridge::on_token_invalidated) and
//!   [`on_invitation_received`](SignalingBridge::on_invitation_received)
//! - the host surface calls the call-control methods and drains the
//!   [`CommandReceiver`] returned by the builder
//! - the host networking layer asks for
//!   [`bind_to_preferred_network`](SignalingBridge::bind_to_preferred_network)
//!   or a full [`TransportBinding`]
//! - an optional [`DeliveryRegistrar`] is kept in sync with the push token
//!
//! All state is process scoped: build one bridge at startup, share it by
//! reference (or inside an `Arc`), and call [`shutdown`](SignalingBridge::shutdown)
//! before dropping it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use softphone_bridge_core::{
//!     BridgeConfig, CallInvitation, CallState, FixedInterfaces, NetworkPath, PathKind, SignalingBridge,
//! };
//!
//! #[tokio::main]
//! async fn main() -> softphone_bridge_core::Result<()> {
//!     let interfaces = FixedInterfaces::new(vec![NetworkPath::new(
//!         "wlan0",
//!         "192.168.1.20".parse().unwrap(),
//!         PathKind::Wifi,
//!     )]);
//!     let (bridge, mut commands) = SignalingBridge::builder()
//!         .config(BridgeConfig::default().with_ring_timeout_secs(None))
//!         .interfaces(Arc::new(interfaces))
//!         .build()?;
//!
//!     bridge.on_token_issued("device-token");
//!     bridge.on_invitation_received(CallInvitation::new("abc", "Alice", "1001")).await?;
//!     assert_eq!(bridge.accept(&"abc".into()).await?, CallState::Active);
//!
//!     let names: Vec<_> = commands.drain().iter().map(|c| c.name()).collect();
//!     assert_eq!(names, ["PresentIncomingCall", "ActivateAudioPath"]);
//!
//!     bridge.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands::{command_queue, CommandReceiver, CommandSink};
use crate::config::BridgeConfig;
use crate::dispatcher::CallActionDispatcher;
use crate::errors::{BridgeError, Result, SessionError};
use crate::network::{
    InterfaceEnumerator, NetworkPath, NetworkPathSelector, SystemInterfaces, TransportBinding, TransportKind,
};
use crate::push::{spawn_registrar_forwarder, DeliveryRegistrar, PushToken, PushTokenLifecycle};
use crate::session::{CallId, CallInvitation, CallSessionStateMachine, CallState, PathSource, Transition};

impl PathSource for NetworkPathSelector {
    fn current_path(&self) -> Option<NetworkPath> {
        self.bound_path()
    }
}

/// What [`SignalingBridge::shutdown`] tore down
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Ringing calls that were declined
    pub declined: usize,
    /// Active calls that were ended
    pub ended: usize,
}

/// Builder for [`SignalingBridge`]
pub struct SignalingBridgeBuilder {
    config: BridgeConfig,
    interfaces: Option<Arc<dyn InterfaceEnumerator>>,
    registrar: Option<Arc<dyn DeliveryRegistrar>>,
}

impl SignalingBridgeBuilder {
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
            interfaces: None,
            registrar: None,
        }
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Interface source for path selection; defaults to [`SystemInterfaces`]
    pub fn interfaces(mut self, interfaces: Arc<dyn InterfaceEnumerator>) -> Self {
        self.interfaces = Some(interfaces);
        self
    }

    /// Keep `registrar` in sync with the push token.
    ///
    /// The forwarding task is spawned by `build`, which then has to run inside
    /// a tokio runtime.
    pub fn registrar(mut self, registrar: Arc<dyn DeliveryRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Build the bridge with an in-process command queue
    pub fn build(self) -> Result<(SignalingBridge, CommandReceiver)> {
        let (sender, receiver) = command_queue();
        let bridge = self.build_with_sink(Arc::new(sender))?;
        Ok((bridge, receiver))
    }

    /// Build the bridge delivering host commands to `sink`
    pub fn build_with_sink(self, sink: Arc<dyn CommandSink>) -> Result<SignalingBridge> {
        self.config.validate()?;

        let lifecycle = Arc::new(PushTokenLifecycle::new(self.config.token_event_capacity));
        let interfaces = self.interfaces.unwrap_or_else(|| Arc::new(SystemInterfaces));
        let selector = Arc::new(NetworkPathSelector::new(interfaces));

        let path_source: Arc<dyn PathSource> = selector.clone();
        let machine = CallSessionStateMachine::new(self.config.to_machine_config(), sink, Some(path_source));
        let dispatcher = CallActionDispatcher::new(machine.clone());

        let forwarder = match self.registrar {
            Some(registrar) => {
                if tokio::runtime::Handle::try_current().is_err() {
                    return Err(BridgeError::config("registrar forwarding requires a running tokio runtime"));
                }
                Some(spawn_registrar_forwarder(&lifecycle, registrar))
            }
            None => None,
        };

        info!(
            max_sessions = self.config.max_concurrent_sessions,
            ring_timeout_secs = ?self.config.ring_timeout_secs,
            require_push_token = self.config.require_push_token,
            "Signaling bridge ready"
        );

        Ok(SignalingBridge {
            config: self.config,
            lifecycle,
            selector,
            machine,
            dispatcher,
            forwarder: Mutex::new(forwarder),
        })
    }
}

impl Default for SignalingBridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wires push token lifecycle, path selection, call sessions and actions together
pub struct SignalingBridge {
    config: BridgeConfig,
    lifecycle: Arc<PushTokenLifecycle>,
    selector: Arc<NetworkPathSelector>,
    machine: CallSessionStateMachine,
    dispatcher: CallActionDispatcher,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl SignalingBridge {
    pub fn builder() -> SignalingBridgeBuilder {
        SignalingBridgeBuilder::new()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Arc<PushTokenLifecycle> {
        &self.lifecycle
    }

    pub fn selector(&self) -> &Arc<NetworkPathSelector> {
        &self.selector
    }

    pub fn machine(&self) -> &CallSessionStateMachine {
        &self.machine
    }

    pub fn dispatcher(&self) -> &CallActionDispatcher {
        &self.dispatcher
    }

    // Push subsystem inputs

    pub fn on_token_issued(&self, token: impl Into<String>) -> PushToken {
        self.lifecycle.on_token_issued(token)
    }

    pub fn on_token_invalidated(&self) -> Option<PushToken> {
        self.lifecycle.on_token_invalidated()
    }

    pub fn can_receive_calls(&self) -> bool {
        self.lifecycle.can_receive_calls()
    }

    /// Start ringing for a pushed invitation.
    ///
    /// While the token gate is enabled and no valid token exists, a call id
    /// with no session is refused with [`BridgeError::PushNotRegistered`];
    /// retransmissions for calls already tracked are still answered. The path
    /// is refreshed first and a call without a usable path is still presented,
    /// with `path: None`.
    pub async fn on_invitation_received(&self, invitation: CallInvitation) -> Result<Transition> {
        let admit_new = !self.config.require_push_token || self.lifecycle.can_receive_calls();

        let path = match self.selector.refresh() {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(call_id = %invitation.call_id, "Presenting call without a bound path: {}", e);
                None
            }
        };

        match self.machine.handle_invitation_admitting(invitation, path, admit_new).await {
            Err(SessionError::NotAdmitted { call_id }) => {
                warn!(%call_id, "Invitation received without a valid push token");
                Err(BridgeError::PushNotRegistered { call_id })
            }
            result => Ok(result?),
        }
    }

    // Host and timer inputs

    pub async fn accept(&self, call_id: &CallId) -> std::result::Result<CallState, SessionError> {
        self.dispatcher.accept(call_id).await
    }

    pub async fn decline(&self, call_id: &CallId) -> std::result::Result<CallState, SessionError> {
        self.dispatcher.decline(call_id).await
    }

    pub async fn end(&self, call_id: &CallId) -> std::result::Result<CallState, SessionError> {
        self.dispatcher.end(call_id).await
    }

    pub async fn timeout(&self, call_id: &CallId) -> std::result::Result<CallState, SessionError> {
        self.dispatcher.timeout(call_id).await
    }

    pub async fn teardown_confirmed(&self, call_id: &CallId) -> std::result::Result<CallState, SessionError> {
        self.dispatcher.teardown_confirmed(call_id).await
    }

    pub async fn notification_action(
        &self,
        call_id: &CallId,
        identifier: &str,
    ) -> std::result::Result<Option<CallState>, SessionError> {
        self.dispatcher.notification_action(call_id, identifier).await
    }

    // Host networking outputs

    /// Local address for outbound sockets, or an empty string for "no binding"
    pub fn bind_to_preferred_network(&self) -> String {
        self.selector.bind_to_preferred_network()
    }

    /// Transport parameters for the currently bound path, refreshing the
    /// binding when nothing is bound yet
    pub fn transport_binding(&self, kind: TransportKind, port: u16) -> TransportBinding {
        let path = self.selector.bound_path().or_else(|| self.selector.refresh().ok());
        TransportBinding::for_path(kind, path.as_ref(), port)
    }

    /// Hang up every call and release process-scoped resources.
    ///
    /// Ringing calls are declined and active calls ended through the normal
    /// transitions, so the host still receives their commands. Calls already
    /// tearing down are left to finish.
    pub async fn shutdown(&self) -> ShutdownSummary {
        if let Some(forwarder) = self.forwarder.lock().take() {
            forwarder.abort();
        }

        let mut summary = ShutdownSummary::default();
        for session in self.machine.sessions().await {
            let call_id = &session.call_id;
            match session.state {
                CallState::Ringing => {
                    if self.dispatcher.decline(call_id).await.is_ok() {
                        summary.declined += 1;
                    }
                }
                CallState::Active => {
                    if self.dispatcher.end(call_id).await.is_ok() {
                        summary.ended += 1;
                    }
                }
                CallState::Ending | CallState::Ended => {}
            }
        }

        self.selector.release();
        info!(declined = summary.declined, ended = summary.ended, "Signaling bridge shut down");
        summary
    }
}

impl Drop for SignalingBridge {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.get_mut().take() {
            forwarder.abort();
        }
    }
}
