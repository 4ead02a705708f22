//! Networks marked unreachable on this member.

use crate::types::ProjectNetwork;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Set of networks that failed to start locally.
///
/// Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct UnavailableNetworks {
    inner: Arc<Mutex<HashSet<ProjectNetwork>>>,
}

impl UnavailableNetworks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unavailable(&self, network: ProjectNetwork) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).insert(network);
    }

    pub fn mark_available(&self, network: &ProjectNetwork) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).remove(network);
    }

    pub fn is_available(&self, network: &ProjectNetwork) -> bool {
        !self.inner.lock().unwrap_or_else(PoisonError::into_inner).contains(network)
    }

    /// All networks currently marked unavailable.
    pub fn list(&self) -> Vec<ProjectNetwork> {
        let mut networks: Vec<ProjectNetwork> =
            self.inner.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect();
        networks.sort();
        networks
    }
}
