use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, info, warn};

use super::interfaces::InterfaceEnumerator;
use super::path::NetworkPath;
use crate::errors::PathError;

/// Picks and pins the network path used for outbound signaling sockets
///
/// At most one path is bound at a time. A failed refresh clears the binding,
/// since the previously bound interface is no longer known to be viable.
pub struct NetworkPathSelector {
    enumerator: Arc<dyn InterfaceEnumerator>,
    bound: ArcSwapOption<NetworkPath>,
}

impl NetworkPathSelector {
    pub fn new(enumerator: Arc<dyn InterfaceEnumerator>) -> Self {
        Self {
            enumerator,
            bound: ArcSwapOption::empty(),
        }
    }

    /// Choose one path among `candidates`.
    ///
    /// Drops loopback, link-down and anything that is not a private IPv4
    /// address, then prefers wifi over cellular over other. Ties keep
    /// enumeration order. `None` means "no usable path yet".
    pub fn select_path(candidates: &[NetworkPath]) -> Option<NetworkPath> {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, path)| path.is_up && !path.is_loopback && path.is_private_ipv4())
            .min_by_key(|(index, path)| (path.rank(), *index))
            .map(|(_, path)| path.clone())
    }

    /// Enumerate, select and bind
    pub fn refresh(&self) -> Result<NetworkPath, PathError> {
        let candidates = match self.enumerator.list_candidate_paths() {
            Ok(candidates) => candidates,
            Err(e) => {
                self.bound.store(None);
                return Err(e);
            }
        };

        match Self::select_path(&candidates) {
            Some(path) => {
                let previous = self.bound.swap(Some(Arc::new(path.clone())));
                if previous.as_deref() != Some(&path) {
                    info!(interface = %path.interface_id, address = %path.local_address, kind = %path.kind, "Bound preferred network path");
                }
                Ok(path)
            }
            None => {
                debug!("No usable path among {} candidates", candidates.len());
                self.bound.store(None);
                Err(PathError::NoUsablePath)
            }
        }
    }

    /// Local address to bind outbound sockets to, or an empty string when no
    /// binding is possible
    pub fn bind_to_preferred_network(&self) -> String {
        match self.refresh() {
            Ok(path) => path.local_address.to_string(),
            Err(PathError::NoUsablePath) => String::new(),
            Err(e) => {
                warn!("Preferred network binding failed: {}", e);
                String::new()
            }
        }
    }

    pub fn bound_path(&self) -> Option<NetworkPath> {
        self.bound.load_full().map(|path| (*path).clone())
    }

    pub fn release(&self) {
        if self.bound.swap(None).is_some() {
            info!("Released bound network path");
        }
    }
}
