//! Shared helpers for bridge integration tests

#![allow(dead_code)]

use std::sync::Arc;

use softphone_bridge_core::{
    BridgeConfig, CommandReceiver, FixedInterfaces, HostCommand, NetworkPath, PathKind, SignalingBridge,
};

pub fn wifi_path() -> NetworkPath {
    NetworkPath::new("wlan0", "10.0.0.5".parse().unwrap(), PathKind::Wifi)
}

pub fn cellular_path() -> NetworkPath {
    NetworkPath::new("rmnet0", "172.20.0.9".parse().unwrap(), PathKind::Cellular)
}

/// Bridge with a registered token, a wifi path and no automatic ring timeout
pub fn ready_bridge() -> (SignalingBridge, CommandReceiver) {
    bridge_with(BridgeConfig::default().with_ring_timeout_secs(None))
}

/// Route bridge logs to the test harness; filter with `RUST_LOG`
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn bridge_with(config: BridgeConfig) -> (SignalingBridge, CommandReceiver) {
    init_test_logging();
    let (bridge, commands) = SignalingBridge::builder()
        .config(config)
        .interfaces(Arc::new(FixedInterfaces::new(vec![cellular_path(), wifi_path()])))
        .build()
        .expect("valid test configuration");
    bridge.on_token_issued("test-device-token");
    (bridge, commands)
}

pub fn command_names(commands: &mut CommandReceiver) -> Vec<&'static str> {
    commands.drain().iter().map(HostCommand::name).collect()
}
