//! Bridge configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use softphone_infra_common::{ErrorContext, ErrorExt};

use crate::errors::{BridgeError, Result};
use crate::push::DEFAULT_TOKEN_EVENT_CAPACITY;
use crate::session::MachineConfig;

/// Environment prefix for overrides, e.g. `SOFTPHONE_BRIDGE__MAX_CONCURRENT_SESSIONS=2`
pub const ENV_PREFIX: &str = "SOFTPHONE_BRIDGE";

/// Policy values for the signaling bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Automatic ring timeout in seconds; `None` leaves timeouts to the host timer
    pub ring_timeout_secs: Option<u64>,

    /// How long an ended session absorbs duplicate invitations before eviction
    pub terminal_grace_secs: u64,

    pub max_concurrent_sessions: usize,

    /// Refuse invitations while no valid push token is registered
    pub require_push_token: bool,

    /// Depth of the token event broadcast channel
    pub token_event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ring_timeout_secs: Some(45),
            terminal_grace_secs: 30,
            max_concurrent_sessions: 4,
            require_push_token: true,
            token_event_capacity: DEFAULT_TOKEN_EVENT_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Load from an optional file plus `SOFTPHONE_BRIDGE__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = softphone_infra_common::load_layered(path, ENV_PREFIX).map_err(|e| {
            let ctx = ErrorContext::new("bridge", "load_config");
            match path {
                Some(path) => e.context(ctx.with_details(path.display().to_string())),
                None => e.context(ctx),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Ring timeout in whole seconds; `None` disables the automatic timer
    pub fn with_ring_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.ring_timeout_secs = secs;
        self
    }

    pub fn with_terminal_grace_secs(mut self, secs: u64) -> Self {
        self.terminal_grace_secs = secs;
        self
    }

    pub fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    pub fn with_push_token_required(mut self, required: bool) -> Self {
        self.require_push_token = required;
        self
    }

    pub fn with_token_event_capacity(mut self, capacity: usize) -> Self {
        self.token_event_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_sessions == 0 {
            return Err(BridgeError::config("max_concurrent_sessions must be at least 1"));
        }
        if self.token_event_capacity == 0 {
            return Err(BridgeError::config("token_event_capacity must be at least 1"));
        }
        if self.ring_timeout_secs == Some(0) {
            return Err(BridgeError::config("ring_timeout_secs must be positive when set"));
        }
        Ok(())
    }

    pub fn ring_timeout(&self) -> Option<Duration> {
        self.ring_timeout_secs.map(Duration::from_secs)
    }

    pub fn terminal_grace(&self) -> Duration {
        Duration::from_secs(self.terminal_grace_secs)
    }

    pub fn to_machine_config(&self) -> MachineConfig {
        MachineConfig {
            ring_timeout: self.ring_timeout(),
            terminal_grace: self.terminal_grace(),
            max_sessions: self.max_concurrent_sessions,
        }
    }
}
