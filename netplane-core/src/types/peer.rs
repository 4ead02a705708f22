//! Network peering types.

use super::network::ConfigMap;
use serde::{Deserialize, Serialize};

/// User-modifiable part of a network peering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPeerPut {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub config: ConfigMap,
}

/// Peering creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPeersPost {
    pub name: String,
    pub target_project: String,
    pub target_network: String,

    #[serde(flatten)]
    pub peer: NetworkPeerPut,
}
