//! Interface enumeration facilities
//!
//! The selector only needs a synchronous list of candidates. [`SystemInterfaces`]
//! reads the local machine; [`FixedInterfaces`] holds a list pushed in by the host
//! (mobile platforms report their attachments through their own APIs).

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::path::{NetworkPath, PathKind};
use crate::errors::PathError;

/// Source of raw candidate paths
pub trait InterfaceEnumerator: Send + Sync {
    /// List every interface/address pair; must complete in bounded local time
    fn list_candidate_paths(&self) -> Result<Vec<NetworkPath>, PathError>;
}

/// Guess the attachment kind from a platform interface name
pub fn classify_interface(name: &str) -> PathKind {
    let name = name.to_ascii_lowercase();

    const CELLULAR: [&str; 5] = ["rmnet", "rev_rmnet", "pdp_ip", "ccmni", "wwan"];
    const WIFI: [&str; 4] = ["wlan", "wifi", "wl", "ap"];

    if CELLULAR.iter().any(|p| name.starts_with(p)) {
        PathKind::Cellular
    } else if name == "en0" || WIFI.iter().any(|p| name.starts_with(p)) {
        PathKind::Wifi
    } else {
        PathKind::Other
    }
}

/// Enumerates the addresses of the local machine
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceEnumerator for SystemInterfaces {
    fn list_candidate_paths(&self) -> Result<Vec<NetworkPath>, PathError> {
        let interfaces = local_ip_address::list_afinet_netifas()
            .map_err(|e| PathError::enumeration(e.to_string()))?;

        let paths: Vec<NetworkPath> = interfaces
            .into_iter()
            .map(|(name, addr)| {
                let kind = classify_interface(&name);
                trace!(interface = %name, address = %addr, %kind, "Enumerated interface");
                NetworkPath::new(name, addr, kind)
            })
            .collect();

        debug!("Enumerated {} candidate paths", paths.len());
        Ok(paths)
    }
}

/// Host-supplied candidate list
#[derive(Debug, Default)]
pub struct FixedInterfaces {
    paths: RwLock<Vec<NetworkPath>>,
}

impl FixedInterfaces {
    pub fn new(paths: Vec<NetworkPath>) -> Self {
        Self {
            paths: RwLock::new(paths),
        }
    }

    /// Replace the list after a network change notification
    pub fn replace(&self, paths: Vec<NetworkPath>) {
        *self.paths.write() = paths;
    }
}

impl InterfaceEnumerator for FixedInterfaces {
    fn list_candidate_paths(&self) -> Result<Vec<NetworkPath>, PathError> {
        Ok(self.paths.read().clone())
    }
}
