//! Network path value types

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Kind of network attachment behind an interface
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Wifi,
    Cellular,
    Other,
}

impl PathKind {
    /// Preference order used by the selector; lower is better
    pub fn preference(&self) -> u8 {
        match self {
            PathKind::Wifi => 0,
            PathKind::Cellular => 1,
            PathKind::Other => 2,
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::Wifi => write!(f, "wifi"),
            PathKind::Cellular => write!(f, "cellular"),
            PathKind::Other => write!(f, "other"),
        }
    }
}

/// One interface/address pair reported by the platform
///
/// `is_up` and `is_loopback` are raw platform facts used for filtering; the
/// selection rank is derived from `kind` at selection time and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPath {
    pub interface_id: String,
    pub local_address: IpAddr,
    pub kind: PathKind,
    pub is_up: bool,
    pub is_loopback: bool,
}

impl NetworkPath {
    /// A link-up candidate; loopback is inferred from the address
    pub fn new(interface_id: impl Into<String>, local_address: IpAddr, kind: PathKind) -> Self {
        Self {
            interface_id: interface_id.into(),
            local_address,
            kind,
            is_up: true,
            is_loopback: local_address.is_loopback(),
        }
    }

    pub fn with_link_down(mut self) -> Self {
        self.is_up = false;
        self
    }

    pub fn with_loopback(mut self) -> Self {
        self.is_loopback = true;
        self
    }

    pub fn rank(&self) -> u8 {
        self.kind.preference()
    }

    /// IPv4 in 10.0.0.0/8, 172.16.0.0/12 or 192.168.0.0/16
    pub fn is_private_ipv4(&self) -> bool {
        match self.local_address {
            IpAddr::V4(v4) => v4.is_private(),
            IpAddr::V6(_) => false,
        }
    }
}

impl fmt::Display for NetworkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.interface_id, self.local_address, self.kind)
    }
}
