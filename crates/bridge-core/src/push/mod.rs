//! Push token lifecycle
//!
//! Incoming calls reach the device only through push delivery, so the token the
//! push subsystem issues gates whether new call sessions can exist at all.

pub mod lifecycle;
pub mod token;

pub use lifecycle::{spawn_registrar_forwarder, PushTokenLifecycle, DEFAULT_TOKEN_EVENT_CAPACITY};
pub use token::{DeliveryRegistrar, PushToken, TokenEvent};
