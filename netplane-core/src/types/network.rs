//! Network domain types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Network configuration keys and values.
pub type ConfigMap = HashMap<String, String>;

/// Name of the project networks live in when no project is given.
pub const DEFAULT_PROJECT: &str = "default";

/// Network status as reported to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NetworkStatus {
    Created,
    #[default]
    Pending,
    Errored,
    Unavailable,
    Unknown,
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkStatus::Created => write!(f, "Created"),
            NetworkStatus::Pending => write!(f, "Pending"),
            NetworkStatus::Errored => write!(f, "Errored"),
            NetworkStatus::Unavailable => write!(f, "Unavailable"),
            NetworkStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Placement state of a network on a single cluster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberState {
    #[default]
    Pending,
    Created,
    Errored,
}

impl MemberState {
    /// Database representation.
    pub fn as_i64(self) -> i64 {
        match self {
            MemberState::Pending => 0,
            MemberState::Created => 1,
            MemberState::Errored => 2,
        }
    }

    /// Parse the database representation, unknown values map to `None`.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(MemberState::Pending),
            1 => Some(MemberState::Created),
            2 => Some(MemberState::Errored),
            _ => None,
        }
    }

    /// API status for a member in this state.
    pub fn status(self) -> NetworkStatus {
        match self {
            MemberState::Pending => NetworkStatus::Pending,
            MemberState::Created => NetworkStatus::Created,
            MemberState::Errored => NetworkStatus::Errored,
        }
    }
}

/// Placement record of a network on one cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMember {
    /// Cluster member name
    pub name: String,

    /// Readiness of the network on that member
    pub state: MemberState,
}

/// User-modifiable part of a network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPut {
    pub description: String,
    pub config: ConfigMap,
}

/// A network as stored in the cluster database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Database ID
    pub id: i64,

    /// Owning project
    pub project: String,

    /// Network name, unique within the project
    pub name: String,

    /// Driver type (e.g. "bridge", "ovn")
    pub driver: String,

    pub description: String,

    /// Effective config for the local member
    pub config: ConfigMap,

    pub status: NetworkStatus,

    /// Whether the network is managed by netplane
    pub managed: bool,

    /// Placement by member ID
    pub members: HashMap<i64, NetworkMember>,
}

/// Identifies a network across projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectNetwork {
    pub project: String,
    pub network: String,
}

impl ProjectNetwork {
    pub fn new(project: impl Into<String>, network: impl Into<String>) -> Self {
        Self { project: project.into(), network: network.into() }
    }
}

/// Origin of a request.
///
/// A request relayed by another cluster member is a notification and must not be
/// fanned out or persisted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientOrigin {
    #[default]
    Direct,
    Notification,
}

impl std::fmt::Display for ClientOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientOrigin::Direct => write!(f, "direct"),
            ClientOrigin::Notification => write!(f, "notification"),
        }
    }
}

/// Network protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(format!("Unknown protocol: {}", s)),
        }
    }
}

/// A DHCP/SLAAC lease handed out by a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLease {
    pub hostname: String,
    pub hwaddr: String,
    pub address: String,
    #[serde(rename = "type")]
    pub lease_type: String,
    pub location: String,
}
