//! Cluster membership plumbing used by the network layer.

pub mod config;
pub mod notify;

pub use config::{ClusterConfig, HEARTBEAT_INTERVAL};
pub use notify::{MemberClient, Notifier, NotifyPolicy};
