use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Push registration token issued by the delivery subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushToken {
    /// Opaque token value
    pub value: String,
    /// When this token became current
    pub registered_at: DateTime<Utc>,
    /// Cleared only by an explicit invalidation
    pub valid: bool,
}

impl PushToken {
    pub fn issue(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            registered_at: Utc::now(),
            valid: true,
        }
    }

    /// Same token, marked unusable; the value is kept for diagnostics
    pub fn invalidated(&self) -> Self {
        Self {
            valid: false,
            ..self.clone()
        }
    }

    /// Shortened value safe for log lines
    pub fn redacted(&self) -> String {
        let head: String = self.value.chars().take(6).collect();
        if self.value.chars().count() > 6 {
            format!("{}…", head)
        } else {
            head
        }
    }
}

/// Notifications published on token changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// A new token replaced the current one
    TokenChanged(PushToken),
    /// The current token stopped being valid
    TokenInvalidated(PushToken),
}

/// Collaborator that registers the device token with the call server
#[async_trait]
pub trait DeliveryRegistrar: Send + Sync {
    async fn register(&self, token: &PushToken) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn unregister(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
