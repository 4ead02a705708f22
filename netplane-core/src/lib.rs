//! netplane Core Library
//!
//! Network driver base layer of the netplane cluster control plane: config
//! validation, cluster replication, BGP advertisement, forward and peering
//! validation and dependency propagation shared by every network driver.

pub mod bgp;
pub mod cluster;
pub mod config;
pub mod error;
pub mod network;
pub mod observability;
pub mod paths;
pub mod state;
pub mod types;
pub mod validate;

// Re-export commonly used items
pub use bgp::{BgpServer, RouteTable};
pub use cluster::{ClusterConfig, MemberClient, Notifier, NotifyPolicy};
pub use config::Config;
pub use error::{NetplaneError, Result};
pub use network::{DriverRegistry, Network, NetworkCommon, NetworkLoader, NetworkState};
pub use observability::init as init_observability;
pub use state::{AclStore, ClusterStore, StateManager};
pub use types::{ClientOrigin, ConfigMap, NetworkPut, NetworkStatus};
