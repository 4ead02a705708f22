//! Collaborators shared by every network on a member.

use super::availability::UnavailableNetworks;
use super::dirs::NetworkDirs;
use super::driver::NetworkLoader;
use crate::bgp::BgpServer;
use crate::cluster::Notifier;
use crate::state::{AclStore, ClusterStore};
use std::sync::Arc;

/// Member-wide state handed to every network instance.
#[derive(Clone)]
pub struct NetworkState {
    /// Cluster database
    pub store: Arc<dyn ClusterStore>,

    /// ACL database
    pub acls: Arc<dyn AclStore>,

    /// Local BGP speaker
    pub bgp: Arc<dyn BgpServer>,

    /// Relays changes to the other members
    pub notifier: Notifier,

    /// Instantiates drivers for stored networks
    pub loader: Arc<dyn NetworkLoader>,

    /// On-disk per-network state
    pub dirs: NetworkDirs,

    /// Networks that failed to start locally
    pub unavailable: UnavailableNetworks,
}
