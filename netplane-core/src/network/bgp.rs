//! BGP peers and prefixes derived from network config.
//!
//! Peers are diffed against the previous config so that unchanged sessions are
//! left alone. Prefixes are withdrawn and re-exported as a whole per owner tag.

use super::common::NetworkCommon;
use crate::error::{NetplaneError, Result};
use crate::network::keys::is_true;
use crate::types::ConfigMap;
use crate::validate::{self, Rules};
use ipnet::IpNet;
use metrics::counter;
use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::{debug, info, instrument};

const PEERS_PREFIX: &str = "bgp.peers.";

/// IP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub const ALL: [IpVersion; 2] = [IpVersion::V4, IpVersion::V6];

    pub fn number(self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    /// Address matching any address of this version.
    pub fn unspecified(self) -> IpAddr {
        match self {
            IpVersion::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpVersion::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    /// Prefix length of a single host route.
    pub fn host_prefix_len(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }

    /// Config key `ipv{4,6}.<suffix>`.
    fn key(self, suffix: &str) -> String {
        format!("ipv{}.{}", self.number(), suffix)
    }
}

/// A peer as configured through `bgp.peers.<name>.*` keys.
///
/// Kept as the raw config values so that a peer is only considered changed
/// when its config text changes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BgpPeerConfig {
    pub address: String,
    pub asn: String,
    pub password: String,
}

impl fmt::Display for BgpPeerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.address, self.asn, self.password)
    }
}

impl BgpPeerConfig {
    fn ip(&self) -> Result<IpAddr> {
        self.address.parse().map_err(|_| NetplaneError::BgpFailed {
            reason: format!("Invalid peer address {:?}", self.address),
        })
    }

    fn asn(&self) -> Result<u32> {
        self.asn.parse::<u32>().map_err(|_| NetplaneError::BgpFailed {
            reason: format!("Invalid peer ASN {:?}", self.asn),
        })
    }
}

/// Validation rules for the `bgp.peers.<name>.<field>` keys present in `config`.
pub fn bgp_validation_rules(network: &str, config: &ConfigMap) -> Result<Rules> {
    let mut rules = Rules::new();

    for key in config.keys().filter(|k| k.starts_with(PEERS_PREFIX)) {
        let fields: Vec<&str> = key.split('.').collect();
        if fields.len() != 4 {
            return Err(NetplaneError::InvalidOption {
                network: network.to_string(),
                key: key.clone(),
            });
        }

        let validator = match fields[3] {
            "address" => validate::optional(validate::is_network_address),
            "asn" => validate::optional(validate::is_in_range(1, 4_294_967_294)),
            "password" => validate::optional(validate::is_any),
            _ => continue,
        };
        rules.insert(key.clone(), validator);
    }

    Ok(rules)
}

/// Peers configured in `config`; a peer needs both an address and an ASN.
pub fn bgp_get_peers(config: &ConfigMap) -> BTreeSet<BgpPeerConfig> {
    let names: BTreeSet<&str> = config
        .keys()
        .filter_map(|k| k.strip_prefix(PEERS_PREFIX))
        .filter_map(|rest| rest.split('.').next())
        .collect();

    let get = |name: &str, field: &str| {
        config.get(&format!("{}{}.{}", PEERS_PREFIX, name, field)).cloned().unwrap_or_default()
    };

    names
        .into_iter()
        .map(|name| BgpPeerConfig {
            address: get(name, "address"),
            asn: get(name, "asn"),
            password: get(name, "password"),
        })
        .filter(|p| !p.address.is_empty() && !p.asn.is_empty())
        .collect()
}

impl NetworkCommon {
    /// Owner tag of the network's own prefixes.
    pub fn bgp_owner(&self) -> String {
        format!("network_{}", self.id)
    }

    /// Owner tag of the prefixes exported for the network's address forwards.
    pub fn bgp_forward_owner(&self) -> String {
        format!("network_{}_forward", self.id)
    }

    /// Set up peers, network prefixes and forward prefixes.
    ///
    /// `old` is the config before the change, `None` on first setup.
    #[instrument(skip(self, old), fields(project = %self.project, network = %self.name))]
    pub async fn bgp_setup(&self, old: Option<&ConfigMap>) -> Result<()> {
        let empty = ConfigMap::new();

        self.bgp_setup_peers(old.unwrap_or(&empty))
            .await
            .map_err(|e| NetplaneError::BgpSetupFailed { stage: "peers", reason: e.to_string() })?;

        self.bgp_setup_prefixes(old).await.map_err(|e| NetplaneError::BgpSetupFailed {
            stage: "prefixes",
            reason: e.to_string(),
        })?;

        self.forward_bgp_setup_prefixes().await.map_err(|e| NetplaneError::BgpSetupFailed {
            stage: "address forward prefixes",
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Remove the peers of `config` and every prefix of the network.
    #[instrument(skip(self, config), fields(project = %self.project, network = %self.name))]
    pub async fn bgp_clear(&self, config: &ConfigMap) -> Result<()> {
        self.bgp_clear_peers(config).await?;
        self.state.bgp.remove_prefix_by_owner(&self.bgp_owner()).await?;
        self.state.bgp.remove_prefix_by_owner(&self.bgp_forward_owner()).await?;
        Ok(())
    }

    /// Remove the peers of `config`.
    pub async fn bgp_clear_peers(&self, config: &ConfigMap) -> Result<()> {
        for peer in bgp_get_peers(config) {
            self.state.bgp.remove_peer(peer.ip()?).await?;
            counter!("netplane_bgp_peers_removed_total").increment(1);
        }
        Ok(())
    }

    /// Apply the difference between the peers of `old` and the current config.
    pub async fn bgp_setup_peers(&self, old: &ConfigMap) -> Result<()> {
        let new_peers = bgp_get_peers(&self.config);
        let old_peers = bgp_get_peers(old);

        for peer in old_peers.difference(&new_peers) {
            self.state.bgp.remove_peer(peer.ip()?).await?;
            counter!("netplane_bgp_peers_removed_total").increment(1);
            info!(peer = %peer.address, "Removed BGP peer");
        }

        for peer in new_peers.difference(&old_peers) {
            self.state.bgp.add_peer(peer.ip()?, peer.asn()?, &peer.password).await?;
            counter!("netplane_bgp_peers_added_total").increment(1);
            info!(peer = %peer.address, asn = %peer.asn, "Added BGP peer");
        }

        Ok(())
    }

    /// Next hop for routes of `version`.
    ///
    /// First of `bgp.ipv{4,6}.nexthop`, `volatile.network.ipv{4,6}.address` or
    /// the unspecified address.
    pub fn bgp_next_hop_address(&self, version: IpVersion) -> IpAddr {
        let candidates = [
            format!("bgp.ipv{}.nexthop", version.number()),
            format!("volatile.network.ipv{}.address", version.number()),
        ];

        candidates
            .iter()
            .filter_map(|key| self.config.get(key))
            .find_map(|value| value.parse::<IpAddr>().ok())
            .unwrap_or_else(|| version.unspecified())
    }

    /// Re-export the network's own prefixes.
    ///
    /// With NAT the NAT address is exported as a host route, otherwise the
    /// network subnet. Nothing is withdrawn when `old` is `None`.
    pub async fn bgp_setup_prefixes(&self, old: Option<&ConfigMap>) -> Result<()> {
        let owner = self.bgp_owner();

        if old.is_some() {
            self.state.bgp.remove_prefix_by_owner(&owner).await?;
        }

        for version in IpVersion::ALL {
            let next_hop = self.bgp_next_hop_address(version);

            let prefix = if is_true(self.config_value(&version.key("nat"))) {
                let nat_key = version.key("nat.address");
                let nat_address = self.config_value(&nat_key);
                if nat_address.is_empty() {
                    continue;
                }

                let addr: IpAddr = nat_address.parse().map_err(|_| NetplaneError::InvalidValue {
                    network: self.name.clone(),
                    key: nat_key.clone(),
                    reason: format!("Not an IP address {:?}", nat_address),
                })?;
                IpNet::new(addr, version.host_prefix_len()).map_err(NetplaneError::internal)?
            } else {
                let key = version.key("address");
                let address = self.config_value(&key);
                if address.is_empty() || address == "none" {
                    continue;
                }

                address.parse::<IpNet>().map(|n| n.trunc()).map_err(|_| {
                    NetplaneError::InvalidValue {
                        network: self.name.clone(),
                        key,
                        reason: format!("Failed parsing network address {:?}", address),
                    }
                })?
            };

            self.state.bgp.add_prefix(prefix, next_hop, &owner).await?;
            counter!("netplane_bgp_prefixes_added_total", "owner" => "network").increment(1);
            debug!(%prefix, %next_hop, "Exported network prefix");
        }

        Ok(())
    }

    /// Re-export the listen addresses of the network's forwards.
    ///
    /// Listen addresses inside the subnet of a NAT enabled family are internal
    /// and are not exported.
    pub async fn forward_bgp_setup_prefixes(&self) -> Result<()> {
        let listen_addresses = self.state.store.forward_listen_addresses(self.id, true).await?;

        let owner = self.bgp_forward_owner();
        self.state.bgp.remove_prefix_by_owner(&owner).await?;

        for version in IpVersion::ALL {
            let next_hop = self.bgp_next_hop_address(version);
            let nat_enabled = is_true(self.config_value(&version.key("nat")));
            let subnet = self.config_value(&version.key("address")).parse::<IpNet>().ok();

            for listen_address in &listen_addresses {
                let addr: IpAddr = listen_address.parse().map_err(|_| NetplaneError::BgpFailed {
                    reason: format!("Invalid forward listen address {:?}", listen_address),
                })?;

                if IpVersion::of(&addr) != version {
                    continue;
                }

                if nat_enabled && subnet.is_some_and(|s| s.contains(&addr)) {
                    continue;
                }

                let prefix =
                    IpNet::new(addr, version.host_prefix_len()).map_err(NetplaneError::internal)?;
                self.state.bgp.add_prefix(prefix, next_hop, &owner).await?;
                counter!("netplane_bgp_prefixes_added_total", "owner" => "forward").increment(1);
                debug!(%prefix, %next_hop, "Exported forward prefix");
            }
        }

        Ok(())
    }

    fn config_value(&self, key: &str) -> &str {
        self.config.get(key).map(String::as_str).unwrap_or("")
    }
}
