//! Cluster member types.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// A host in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub id: i64,
    pub name: String,

    /// Address the member's API is reachable on
    pub address: String,

    /// Last heartbeat received from the member
    pub heartbeat: SystemTime,
}

impl ClusterMember {
    /// Whether the member missed heartbeats for longer than `threshold`.
    pub fn is_offline(&self, threshold: Duration) -> bool {
        match SystemTime::now().duration_since(self.heartbeat) {
            Ok(elapsed) => elapsed > threshold,
            // Heartbeat in the future (clock skew) counts as alive.
            Err(_) => false,
        }
    }
}
