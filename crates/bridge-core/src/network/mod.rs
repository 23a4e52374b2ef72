//! Network path selection
//!
//! Devices often carry several attachments at once (cellular, Wi-Fi, VPN) and only
//! one of them reaches the signaling server. This module enumerates candidates,
//! picks one deterministically and exposes it for socket binding.

pub mod interfaces;
pub mod path;
pub mod selector;
pub mod transport;

pub use interfaces::{classify_interface, FixedInterfaces, InterfaceEnumerator, SystemInterfaces};
pub use path::{NetworkPath, PathKind};
pub use selector::NetworkPathSelector;
pub use transport::{TransportBinding, TransportKind};
