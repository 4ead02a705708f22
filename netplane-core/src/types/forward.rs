//! Network forward types.

use super::network::{ConfigMap, Protocol};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Config key holding a forward's default target address.
pub const TARGET_ADDRESS_KEY: &str = "target_address";

/// One port specification of a forward, as supplied by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkForwardPort {
    #[serde(default)]
    pub description: String,

    /// "tcp" or "udp"
    pub protocol: String,

    /// Comma separated ports or ranges (e.g. "80,8000-8010")
    pub listen_port: String,

    /// Comma separated ports or ranges, empty to reuse the listen ports
    #[serde(default)]
    pub target_port: String,

    pub target_address: String,
}

/// User-modifiable part of a forward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkForwardPut {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub config: ConfigMap,

    #[serde(default)]
    pub ports: Vec<NetworkForwardPort>,
}

/// Forward creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkForwardsPost {
    pub listen_address: String,

    #[serde(flatten)]
    pub forward: NetworkForwardPut,
}

/// Validated mapping of listen port(s) to target port(s) for one protocol and target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardPortMap {
    pub listen_ports: Vec<u16>,

    /// Empty (same as listen), a single port (many-to-one), or one per listen port
    pub target_ports: Vec<u16>,

    pub target_address: IpAddr,

    pub protocol: Protocol,
}
