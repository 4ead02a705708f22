//! Network driver base layer.
//!
//! Every driver embeds a [`NetworkCommon`] and implements [`Network`] on top
//! of it. The common layer handles:
//! - Config validation against common and driver rules
//! - Replicating changes across cluster members
//! - BGP peer and prefix advertisement
//! - Address forward and peering validation
//! - Notifying networks that depend on this one

pub mod availability;
pub mod bgp;
pub mod common;
pub mod dependency;
pub mod dirs;
pub mod driver;
pub mod forward;
pub mod keys;
pub mod peer;
pub mod replication;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use availability::UnavailableNetworks;
pub use bgp::{bgp_get_peers, bgp_validation_rules, BgpPeerConfig, IpVersion};
pub use common::NetworkCommon;
pub use dirs::NetworkDirs;
pub use driver::{DriverFactory, DriverRegistry, Info, Network, NetworkLoader};
pub use forward::parse_port_range;
pub use peer::{valid_subject_name, RESERVED_NETWORK_SUBJECTS};
pub use replication::ConfigDiff;
pub use state::NetworkState;
