//! BGP session state.
//!
//! Networks never talk to a BGP daemon directly. They go through [`BgpServer`],
//! which only knows how to add and remove peers and owner-tagged prefixes.
//! [`RouteTable`] is the in-process implementation: it holds the peers a
//! speaker should have sessions with and the prefixes it should export.

use crate::error::{NetplaneError, Result};
use async_trait::async_trait;
use ipnet::IpNet;
use metrics::{counter, gauge};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// BGP session manager interface.
#[async_trait]
pub trait BgpServer: Send + Sync {
    /// Add a peer session.
    async fn add_peer(&self, address: IpAddr, asn: u32, password: &str) -> Result<()>;

    /// Remove a peer session by address.
    async fn remove_peer(&self, address: IpAddr) -> Result<()>;

    /// Export a prefix on behalf of `owner`.
    async fn add_prefix(&self, subnet: IpNet, next_hop: IpAddr, owner: &str) -> Result<()>;

    /// Withdraw every prefix exported on behalf of `owner`.
    async fn remove_prefix_by_owner(&self, owner: &str) -> Result<()>;
}

/// A configured BGP peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpPeer {
    pub address: IpAddr,
    pub asn: u32,
    pub password: String,

    /// Number of networks that requested this peer
    pub count: usize,
}

/// An exported prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpPrefix {
    pub subnet: IpNet,
    pub next_hop: IpAddr,
    pub owner: String,
}

/// In-process BGP peer and prefix table.
///
/// Several networks may ask for the same peer, so peers are reference counted
/// and only dropped once the last network removed them.
#[derive(Debug, Default)]
pub struct RouteTable {
    peers: RwLock<HashMap<IpAddr, BgpPeer>>,
    prefixes: RwLock<Vec<BgpPrefix>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the configured peers.
    pub async fn peers(&self) -> Vec<BgpPeer> {
        let mut peers: Vec<BgpPeer> = self.peers.read().await.values().cloned().collect();
        peers.sort_by_key(|p| p.address);
        peers
    }

    /// Snapshot of every exported prefix.
    pub async fn prefixes(&self) -> Vec<BgpPrefix> {
        self.prefixes.read().await.clone()
    }

    /// Prefixes exported on behalf of `owner`.
    pub async fn prefixes_by_owner(&self, owner: &str) -> Vec<BgpPrefix> {
        self.prefixes.read().await.iter().filter(|p| p.owner == owner).cloned().collect()
    }
}

#[async_trait]
impl BgpServer for RouteTable {
    #[instrument(skip(self, password))]
    async fn add_peer(&self, address: IpAddr, asn: u32, password: &str) -> Result<()> {
        let mut peers = self.peers.write().await;

        if let Some(existing) = peers.get_mut(&address) {
            if existing.asn != asn || existing.password != password {
                return Err(NetplaneError::BgpFailed {
                    reason: format!("A peer with address {} already exists", address),
                });
            }

            existing.count += 1;
            debug!(count = existing.count, "Peer already configured");
            return Ok(());
        }

        peers.insert(address, BgpPeer { address, asn, password: password.to_string(), count: 1 });
        gauge!("netplane_bgp_peers").set(peers.len() as f64);

        info!("Added BGP peer");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_peer(&self, address: IpAddr) -> Result<()> {
        let mut peers = self.peers.write().await;

        let peer = peers.get_mut(&address).ok_or_else(|| NetplaneError::BgpFailed {
            reason: format!("Peer {} not found", address),
        })?;

        peer.count -= 1;
        if peer.count == 0 {
            peers.remove(&address);
            gauge!("netplane_bgp_peers").set(peers.len() as f64);
            info!("Removed BGP peer");
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_prefix(&self, subnet: IpNet, next_hop: IpAddr, owner: &str) -> Result<()> {
        if subnet.addr().is_ipv4() != next_hop.is_ipv4() {
            return Err(NetplaneError::BgpFailed {
                reason: format!("Next hop {} doesn't match family of prefix {}", next_hop, subnet),
            });
        }

        let prefix = BgpPrefix { subnet: subnet.trunc(), next_hop, owner: owner.to_string() };

        let mut prefixes = self.prefixes.write().await;
        if !prefixes.contains(&prefix) {
            prefixes.push(prefix);
        }
        gauge!("netplane_bgp_prefixes").set(prefixes.len() as f64);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_prefix_by_owner(&self, owner: &str) -> Result<()> {
        let mut prefixes = self.prefixes.write().await;

        let before = prefixes.len();
        prefixes.retain(|p| p.owner != owner);
        let removed = before - prefixes.len();

        gauge!("netplane_bgp_prefixes").set(prefixes.len() as f64);
        counter!("netplane_bgp_prefixes_withdrawn_total").increment(removed as u64);

        debug!(removed, "Withdrew prefixes");
        Ok(())
    }
}
