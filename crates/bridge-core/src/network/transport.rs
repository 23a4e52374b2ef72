//! Transport binding derived from the selected path

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::path::NetworkPath;

/// Signaling transport protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Udp,
    Tcp,
    Tls,
}

impl TransportKind {
    /// Map a host transport code (0 = UDP, 1 = TCP, 2 = TLS).
    ///
    /// Unknown codes fall back to UDP.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => TransportKind::Udp,
            1 => TransportKind::Tcp,
            2 => TransportKind::Tls,
            other => {
                warn!(code = other, "Unknown transport code, using UDP");
                TransportKind::Udp
            }
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            TransportKind::Udp => 0,
            TransportKind::Tcp => 1,
            TransportKind::Tls => 2,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Udp => write!(f, "UDP"),
            TransportKind::Tcp => write!(f, "TCP"),
            TransportKind::Tls => write!(f, "TLS"),
        }
    }
}

/// Parameters for creating the signaling transport.
///
/// Addresses are `None` when no path is bound; the transport then listens on
/// all interfaces. Port 0 lets the OS choose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportBinding {
    pub kind: TransportKind,
    pub bound_address: Option<IpAddr>,
    pub public_address: Option<IpAddr>,
    pub port: u16,
}

impl TransportBinding {
    pub fn for_path(kind: TransportKind, path: Option<&NetworkPath>, port: u16) -> Self {
        let address = path.map(|p| p.local_address);
        Self {
            kind,
            bound_address: address,
            public_address: address,
            port,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.bound_address.is_some()
    }
}

impl fmt::Display for TransportBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound_address {
            Some(addr) => write!(f, "{} {}:{}", self.kind, addr, self.port),
            None => write!(f, "{} *:{}", self.kind, self.port),
        }
    }
}
