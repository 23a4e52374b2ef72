use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use super::token::{DeliveryRegistrar, PushToken, TokenEvent};

/// Default depth of the token notification channel
pub const DEFAULT_TOKEN_EVENT_CAPACITY: usize = 16;

/// Holds the current push token and publishes its changes
///
/// Readers always see a whole token: replacement and invalidation swap an
/// `Arc` atomically. Writers hold `publish` across the swap and the event
/// send, so subscribers observe events in swap order and the last event
/// always describes the current token. State is process-scoped and starts
/// empty; the push subsystem re-issues a token after every restart.
pub struct PushTokenLifecycle {
    current: ArcSwapOption<PushToken>,
    events: broadcast::Sender<TokenEvent>,
    publish: Mutex<()>,
}

impl PushTokenLifecycle {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            current: ArcSwapOption::empty(),
            events,
            publish: Mutex::new(()),
        }
    }

    pub fn current_token(&self) -> Option<PushToken> {
        self.current.load_full().map(|token| (*token).clone())
    }

    /// Replace the current token with a freshly issued, valid one
    pub fn on_token_issued(&self, value: impl Into<String>) -> PushToken {
        let token = PushToken::issue(value);
        let _publish = self.publish.lock();
        let previous = self.current.swap(Some(Arc::new(token.clone())));

        match previous {
            Some(old) if old.value == token.value => debug!(token = %token.redacted(), "Push token re-issued"),
            Some(_) => info!(token = %token.redacted(), "Push token rotated"),
            None => info!(token = %token.redacted(), "Push token registered"),
        }

        let _ = self.events.send(TokenEvent::TokenChanged(token.clone()));
        token
    }

    /// Mark the current token invalid.
    ///
    /// Returns the invalidated token, or `None` when no token was ever issued.
    /// Only a valid-to-invalid change publishes `TokenInvalidated`.
    pub fn on_token_invalidated(&self) -> Option<PushToken> {
        let _publish = self.publish.lock();
        let previous = self.current.rcu(|current| match current {
            Some(token) if token.valid => Some(Arc::new(token.invalidated())),
            other => other.clone(),
        });

        match previous {
            None => {
                warn!("Token invalidation received before any token was issued");
                None
            }
            Some(token) if token.valid => {
                let dead = token.invalidated();
                info!(token = %dead.redacted(), "Push token invalidated");
                let _ = self.events.send(TokenEvent::TokenInvalidated(dead.clone()));
                Some(dead)
            }
            Some(token) => {
                debug!(token = %token.redacted(), "Push token already invalid");
                Some((*token).clone())
            }
        }
    }

    /// True iff a token exists and is valid
    pub fn can_receive_calls(&self) -> bool {
        let current = self.current.load();
        matches!(&*current, Some(token) if token.valid)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.events.subscribe()
    }
}

impl Default for PushTokenLifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_EVENT_CAPACITY)
    }
}

/// Forward token notifications to the delivery registrar until the lifecycle
/// is dropped or the task is aborted
pub fn spawn_registrar_forwarder(
    lifecycle: &Arc<PushTokenLifecycle>,
    registrar: Arc<dyn DeliveryRegistrar>,
) -> JoinHandle<()> {
    let mut events = lifecycle.subscribe();
    let lifecycle = Arc::downgrade(lifecycle);

    tokio::spawn(
        async move {
            loop {
                match events.recv().await {
                    Ok(TokenEvent::TokenChanged(token)) => {
                        if let Err(e) = registrar.register(&token).await {
                            warn!(token = %token.redacted(), "Registrar rejected token: {}", e);
                        }
                    }
                    Ok(TokenEvent::TokenInvalidated(token)) => {
                        if let Err(e) = registrar.unregister().await {
                            warn!(token = %token.redacted(), "Registrar unregister failed: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Registrar forwarder missed {} token events, resyncing", missed);
                        let Some(lifecycle) = lifecycle.upgrade() else { break };
                        let result = match lifecycle.current_token() {
                            Some(token) if token.valid => registrar.register(&token).await,
                            Some(_) => registrar.unregister().await,
                            None => Ok(()),
                        };
                        if let Err(e) = result {
                            warn!("Registrar resync failed: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Registrar forwarder stopped");
        }
        .instrument(info_span!("registrar_forwarder")),
    )
}
