//! Core domain types for netplane.

pub mod acl;
pub mod cluster;
pub mod forward;
pub mod network;
pub mod peer;

// Re-exports
pub use acl::{NetworkAcl, NetworkAclRule};
pub use cluster::ClusterMember;
pub use forward::{ForwardPortMap, NetworkForwardPort, NetworkForwardPut, NetworkForwardsPost};
pub use network::{
    ClientOrigin, ConfigMap, MemberState, NetworkLease, NetworkMember, NetworkPut,
    NetworkRecord, NetworkStatus, ProjectNetwork, Protocol, DEFAULT_PROJECT,
};
pub use peer::{NetworkPeerPut, NetworkPeersPost};
