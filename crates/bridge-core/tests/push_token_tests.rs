//! Push token lifecycle and registrar forwarding

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use softphone_bridge_core::{
    BridgeConfig, BridgeError, CallInvitation, CallState, DeliveryRegistrar, FixedInterfaces, PushToken, PushTokenLifecycle,
    SignalingBridge, TokenEvent,
};
use tokio::sync::mpsc;

/// Registrar that reports every call on a channel
struct RecordingRegistrar {
    calls: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl DeliveryRegistrar for RecordingRegistrar {
    async fn register(&self, token: &PushToken) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = self.calls.send(format!("register:{}", token.value));
        Ok(())
    }

    async fn unregister(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = self.calls.send("unregister".to_string());
        Ok(())
    }
}

async fn next_call(calls: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), calls.recv())
        .await
        .expect("registrar call in time")
        .expect("registrar channel open")
}

#[tokio::test]
async fn test_subscribers_see_rotation_and_invalidation() {
    let lifecycle = PushTokenLifecycle::default();
    let mut events = lifecycle.subscribe();

    lifecycle.on_token_issued("first");
    lifecycle.on_token_issued("second");
    lifecycle.on_token_invalidated();
    // Already invalid: no second notification
    lifecycle.on_token_invalidated();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(match event {
            TokenEvent::TokenChanged(token) => format!("changed:{}", token.value),
            TokenEvent::TokenInvalidated(token) => format!("invalidated:{}", token.value),
        });
    }
    assert_eq!(seen, vec!["changed:first", "changed:second", "invalidated:second"]);
}

#[tokio::test]
async fn test_concurrent_readers_never_see_partial_tokens() {
    let lifecycle = Arc::new(PushTokenLifecycle::default());
    lifecycle.on_token_issued("rot-0");

    let writer = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            for i in 1..200 {
                lifecycle.on_token_issued(format!("rot-{}", i));
                tokio::task::yield_now().await;
            }
        })
    };

    let reader = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let token = lifecycle.current_token().unwrap();
                assert!(token.value.starts_with("rot-"));
                assert!(token.valid);
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    assert_eq!(lifecycle.current_token().unwrap().value, "rot-199");
}

fn last_event(events: &mut tokio::sync::broadcast::Receiver<TokenEvent>) -> Option<TokenEvent> {
    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    last
}

#[test]
fn test_last_event_matches_current_token_under_contention() {
    let lifecycle = PushTokenLifecycle::new(256);
    let mut events = lifecycle.subscribe();

    for round in 0..500 {
        std::thread::scope(|scope| {
            for writer in 0..4 {
                let lifecycle = &lifecycle;
                scope.spawn(move || {
                    lifecycle.on_token_issued(format!("r{}-w{}", round, writer));
                    if writer == 3 && round % 5 == 0 {
                        lifecycle.on_token_invalidated();
                    }
                });
            }
        });

        let current = lifecycle.current_token().unwrap();
        match last_event(&mut events) {
            Some(TokenEvent::TokenChanged(token)) => {
                assert!(current.valid, "round {}: token changed after invalidation", round);
                assert_eq!(token.value, current.value, "round {}", round);
            }
            Some(TokenEvent::TokenInvalidated(token)) => {
                assert!(!current.valid, "round {}: invalidation published out of order", round);
                assert_eq!(token.value, current.value, "round {}", round);
            }
            None => panic!("round {}: no events", round),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registrar_ends_on_current_token_after_concurrent_rotation() {
    let (tx, mut calls) = mpsc::unbounded_channel();
    let config = BridgeConfig::default().with_token_event_capacity(256);
    let (bridge, _commands) = SignalingBridge::builder()
        .config(config)
        .interfaces(Arc::new(FixedInterfaces::new(vec![common::wifi_path()])))
        .registrar(Arc::new(RecordingRegistrar { calls: tx }))
        .build()
        .unwrap();
    let bridge = Arc::new(bridge);

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                for i in 0..25 {
                    bridge.on_token_issued(format!("w{}-{}", writer, i));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let expected = format!("register:{}", bridge.lifecycle().current_token().unwrap().value);
    let mut last = String::new();
    for _ in 0..100 {
        last = next_call(&mut calls).await;
    }
    assert_eq!(last, expected);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_bridge_forwards_tokens_to_registrar() {
    let (tx, mut calls) = mpsc::unbounded_channel();
    let (bridge, _commands) = SignalingBridge::builder()
        .interfaces(Arc::new(FixedInterfaces::new(vec![common::wifi_path()])))
        .registrar(Arc::new(RecordingRegistrar { calls: tx }))
        .build()
        .unwrap();

    bridge.on_token_issued("alpha");
    assert_eq!(next_call(&mut calls).await, "register:alpha");

    bridge.on_token_invalidated();
    assert_eq!(next_call(&mut calls).await, "unregister");

    bridge.on_token_issued("beta");
    assert_eq!(next_call(&mut calls).await, "register:beta");

    bridge.shutdown().await;
    bridge.on_token_issued("gamma");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(calls.try_recv().is_err());
}

#[test]
fn test_registrar_without_runtime_is_config_error() {
    let (tx, _calls) = mpsc::unbounded_channel();
    let result = SignalingBridge::builder()
        .interfaces(Arc::new(FixedInterfaces::new(vec![])))
        .registrar(Arc::new(RecordingRegistrar { calls: tx }))
        .build();
    assert!(matches!(result, Err(BridgeError::Config { .. })));
}

#[tokio::test]
async fn test_invalidated_token_blocks_new_calls() {
    let (bridge, mut commands) = common::bridge_with(BridgeConfig::default().with_ring_timeout_secs(None));
    bridge.on_invitation_received(CallInvitation::new("before", "A", "1")).await.unwrap();

    bridge.on_token_invalidated();
    let err = bridge
        .on_invitation_received(CallInvitation::new("after", "B", "2"))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::PushNotRegistered { .. }));

    // Existing calls keep working
    assert!(bridge.accept(&"before".into()).await.is_ok());
    assert_eq!(common::command_names(&mut commands), vec!["PresentIncomingCall", "ActivateAudioPath"]);
}

#[tokio::test]
async fn test_invalidated_token_still_absorbs_retransmissions() {
    let (bridge, mut commands) = common::bridge_with(BridgeConfig::default().with_ring_timeout_secs(None));
    let invitation = CallInvitation::new("live", "A", "1");
    bridge.on_invitation_received(invitation.clone()).await.unwrap();

    bridge.on_token_invalidated();
    let ringing = bridge.on_invitation_received(invitation.clone()).await.unwrap();
    assert!(ringing.duplicate);
    assert_eq!(ringing.to, CallState::Ringing);

    bridge.accept(&"live".into()).await.unwrap();
    let active = bridge.on_invitation_received(invitation).await.unwrap();
    assert!(active.duplicate);
    assert_eq!(active.to, CallState::Active);

    assert_eq!(common::command_names(&mut commands), vec!["PresentIncomingCall", "ActivateAudioPath"]);
    assert_eq!(bridge.machine().tracked_calls(), 1);
}
