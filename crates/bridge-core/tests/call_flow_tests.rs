//! End-to-end call flows through the signaling bridge

mod common;

use std::time::Duration;

use common::{bridge_with, command_names, ready_bridge, wifi_path};
use softphone_bridge_core::{
    BridgeConfig, CallId, CallInvitation, CallState, HostCommand, SessionError, SessionEventKind,
};

#[tokio::test]
async fn test_answered_call_full_lifecycle() {
    let (bridge, mut commands) = ready_bridge();
    let id = CallId::from("abc");

    bridge
        .on_invitation_received(CallInvitation::new("abc", "Alice", "1001"))
        .await
        .unwrap();
    assert_eq!(bridge.accept(&id).await.unwrap(), CallState::Active);
    assert_eq!(bridge.end(&id).await.unwrap(), CallState::Ending);
    assert_eq!(bridge.teardown_confirmed(&id).await.unwrap(), CallState::Ended);

    assert_eq!(
        command_names(&mut commands),
        vec!["PresentIncomingCall", "ActivateAudioPath", "TeardownAudioPath", "SessionClosed"]
    );
    assert_eq!(bridge.machine().session(&id).await.unwrap().state, CallState::Ended);
}

#[tokio::test]
async fn test_present_carries_invitation_and_path() {
    let (bridge, mut commands) = ready_bridge();
    let invitation = CallInvitation::new("video-1", "Bob", "1002")
        .with_video()
        .with_extra("conference", serde_json::json!(false));

    bridge.on_invitation_received(invitation.clone()).await.unwrap();

    match commands.try_recv() {
        Some(HostCommand::PresentIncomingCall {
            call_id,
            invitation: presented,
            path,
        }) => {
            assert_eq!(call_id, CallId::from("video-1"));
            assert_eq!(presented, invitation);
            assert_eq!(path, Some(wifi_path()));
        }
        other => panic!("expected PresentIncomingCall, got {:?}", other),
    }
}

#[tokio::test]
async fn test_host_timeout_then_second_timeout_rejected() {
    let (bridge, mut commands) = ready_bridge();
    let id = CallId::from("xyz");

    bridge
        .on_invitation_received(CallInvitation::new("xyz", "Carol", "1003"))
        .await
        .unwrap();
    assert_eq!(bridge.timeout(&id).await.unwrap(), CallState::Ended);

    let err = bridge.timeout(&id).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::invalid_transition(&id, CallState::Ended, SessionEventKind::Timeout)
    );
    assert_eq!(command_names(&mut commands), vec!["PresentIncomingCall", "NotifyTimeout"]);
}

#[tokio::test(start_paused = true)]
async fn test_automatic_ring_timeout() {
    let (bridge, mut commands) = bridge_with(BridgeConfig::default().with_ring_timeout_secs(Some(20)));
    let id = CallId::from("xyz");

    bridge
        .on_invitation_received(CallInvitation::new("xyz", "Carol", "1003"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(19)).await;
    assert_eq!(bridge.machine().session(&id).await.unwrap().state, CallState::Ringing);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(bridge.machine().session(&id).await.unwrap().state, CallState::Ended);
    assert_eq!(command_names(&mut commands), vec!["PresentIncomingCall", "NotifyTimeout"]);

    assert!(matches!(
        bridge.timeout(&id).await,
        Err(SessionError::InvalidTransition { state: CallState::Ended, .. })
    ));
}

#[tokio::test]
async fn test_timeout_after_accept_is_rejected() {
    let (bridge, mut commands) = ready_bridge();
    let id = CallId::from("late-timer");

    bridge
        .on_invitation_received(CallInvitation::new("late-timer", "Dan", "1004"))
        .await
        .unwrap();
    bridge.accept(&id).await.unwrap();

    assert!(matches!(
        bridge.timeout(&id).await,
        Err(SessionError::InvalidTransition { state: CallState::Active, .. })
    ));
    assert_eq!(bridge.machine().session(&id).await.unwrap().state, CallState::Active);
    assert_eq!(command_names(&mut commands), vec!["PresentIncomingCall", "ActivateAudioPath"]);
}

#[tokio::test]
async fn test_declined_call() {
    let (bridge, mut commands) = ready_bridge();
    let id = CallId::from("no-thanks");

    bridge
        .on_invitation_received(CallInvitation::new("no-thanks", "Eve", "1005"))
        .await
        .unwrap();
    assert_eq!(bridge.decline(&id).await.unwrap(), CallState::Ended);

    // Nothing after a decline moves the call
    assert!(bridge.accept(&id).await.is_err());
    assert!(bridge.end(&id).await.is_err());
    assert_eq!(command_names(&mut commands), vec!["PresentIncomingCall", "NotifyRemoteDeclined"]);
}

#[tokio::test]
async fn test_retransmitted_invitation_presents_once() {
    let (bridge, mut commands) = ready_bridge();
    let invitation = CallInvitation::new("dup", "Fay", "1006");

    let first = bridge.on_invitation_received(invitation.clone()).await.unwrap();
    let second = bridge.on_invitation_received(invitation.clone()).await.unwrap();
    assert!(!first.duplicate);
    assert!(second.duplicate);

    bridge.accept(&invitation.call_id).await.unwrap();
    let third = bridge.on_invitation_received(invitation).await.unwrap();
    assert!(third.duplicate);
    assert_eq!(third.to, CallState::Active);

    assert_eq!(command_names(&mut commands), vec!["PresentIncomingCall", "ActivateAudioPath"]);
}

#[tokio::test(start_paused = true)]
async fn test_ended_call_id_reusable_after_grace() {
    let config = BridgeConfig::default()
        .with_ring_timeout_secs(None)
        .with_terminal_grace_secs(30);
    let (bridge, mut commands) = bridge_with(config);
    let invitation = CallInvitation::new("reuse", "Gus", "1007");

    bridge.on_invitation_received(invitation.clone()).await.unwrap();
    bridge.decline(&invitation.call_id).await.unwrap();

    let err = bridge.on_invitation_received(invitation.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        softphone_bridge_core::BridgeError::Session(SessionError::DuplicateCall { .. })
    ));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(matches!(
        bridge.accept(&invitation.call_id).await,
        Err(SessionError::UnknownCall { .. })
    ));

    let fresh = bridge.on_invitation_received(invitation).await.unwrap();
    assert_eq!(fresh.from, None);
    assert_eq!(
        command_names(&mut commands),
        vec!["PresentIncomingCall", "NotifyRemoteDeclined", "PresentIncomingCall"]
    );
}

#[tokio::test]
async fn test_unknown_call_actions_are_silent() {
    let (bridge, mut commands) = ready_bridge();
    let id = CallId::from("ghost");

    for result in [
        bridge.accept(&id).await,
        bridge.decline(&id).await,
        bridge.end(&id).await,
        bridge.timeout(&id).await,
        bridge.teardown_confirmed(&id).await,
    ] {
        assert!(result.unwrap_err().is_silent());
    }
    assert!(commands.drain().is_empty());
}

#[tokio::test]
async fn test_notification_buttons_drive_active_call() {
    let (bridge, mut commands) = ready_bridge();
    let id = CallId::from("notif");

    bridge
        .on_invitation_received(CallInvitation::new("notif", "Hal", "1008"))
        .await
        .unwrap();
    bridge.accept(&id).await.unwrap();

    assert_eq!(bridge.notification_action(&id, "MUTE_ACTION").await.unwrap(), Some(CallState::Active));
    assert_eq!(bridge.notification_action(&id, "MUTE_ACTION").await.unwrap(), Some(CallState::Active));
    assert_eq!(bridge.notification_action(&id, "HANGUP_ACTION").await.unwrap(), Some(CallState::Ending));
    assert_eq!(bridge.teardown_confirmed(&id).await.unwrap(), CallState::Ended);

    assert_eq!(
        command_names(&mut commands),
        vec![
            "PresentIncomingCall",
            "ActivateAudioPath",
            "ToggleMute",
            "ToggleMute",
            "TeardownAudioPath",
            "SessionClosed"
        ]
    );
}

#[tokio::test]
async fn test_session_limit() {
    let (bridge, _commands) = bridge_with(
        BridgeConfig::default()
            .with_ring_timeout_secs(None)
            .with_max_concurrent_sessions(2),
    );

    bridge.on_invitation_received(CallInvitation::new("c1", "A", "1")).await.unwrap();
    bridge.on_invitation_received(CallInvitation::new("c2", "B", "2")).await.unwrap();

    let err = bridge
        .on_invitation_received(CallInvitation::new("c3", "C", "3"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        softphone_bridge_core::BridgeError::Session(SessionError::CapacityExceeded { limit: 2 })
    ));

    bridge.decline(&CallId::from("c1")).await.unwrap();
    bridge.on_invitation_received(CallInvitation::new("c3", "C", "3")).await.unwrap();

    let stats = bridge.machine().stats().await;
    assert_eq!(stats.ringing, 2);
    assert_eq!(stats.ended, 1);
}

#[tokio::test]
async fn test_shutdown_hangs_up_everything() {
    let (bridge, mut commands) = ready_bridge();

    bridge.on_invitation_received(CallInvitation::new("ring", "A", "1")).await.unwrap();
    bridge.on_invitation_received(CallInvitation::new("talk", "B", "2")).await.unwrap();
    bridge.accept(&CallId::from("talk")).await.unwrap();
    assert!(bridge.selector().bound_path().is_some());
    commands.drain();

    let summary = bridge.shutdown().await;
    assert_eq!(summary.declined, 1);
    assert_eq!(summary.ended, 1);

    let mut emitted: Vec<(String, &'static str)> = commands
        .drain()
        .iter()
        .map(|c| (c.call_id().to_string(), c.name()))
        .collect();
    emitted.sort();
    assert_eq!(
        emitted,
        vec![
            ("ring".to_string(), "NotifyRemoteDeclined"),
            ("talk".to_string(), "TeardownAudioPath"),
        ]
    );
    assert!(bridge.selector().bound_path().is_none());

    // Host finishes the teardown it was asked for
    assert_eq!(bridge.teardown_confirmed(&CallId::from("talk")).await.unwrap(), CallState::Ended);
}
