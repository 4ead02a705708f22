//! Durable store interfaces consumed by the network layer.
//!
//! [`super::StateManager`] implements both traits on SQLite; tests and embedders
//! may provide their own implementations.

use crate::error::Result;
use crate::types::{ClusterMember, ConfigMap, NetworkAcl, NetworkRecord};
use async_trait::async_trait;
use std::collections::HashMap;

/// Entity type recorded on persistent warnings raised for networks.
pub const WARNING_ENTITY_NETWORK: &str = "network";

/// Cluster database: networks, members, projects, forwards, warnings and cluster config.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// ID of the member this store is running on.
    fn local_member_id(&self) -> i64;

    /// All cluster members, including the local one.
    async fn cluster_members(&self) -> Result<Vec<ClusterMember>>;

    /// Load a network with the config effective on the local member.
    async fn load_network(&self, project: &str, name: &str) -> Result<NetworkRecord>;

    /// Replace a network's description and config.
    ///
    /// Member-specific keys are stored against the local member only.
    async fn update_network(
        &self,
        project: &str,
        name: &str,
        description: &str,
        config: &ConfigMap,
    ) -> Result<()>;

    /// Rename a network within its project.
    async fn rename_network(&self, project: &str, old_name: &str, new_name: &str) -> Result<()>;

    /// Names of all projects.
    async fn project_names(&self) -> Result<Vec<String>>;

    /// Names of the networks in `project` that are fully created.
    async fn created_networks(&self, project: &str) -> Result<Vec<String>>;

    /// Listen addresses of a network's forwards.
    ///
    /// With `member_specific` only forwards that apply to the local member are returned.
    async fn forward_listen_addresses(
        &self,
        network_id: i64,
        member_specific: bool,
    ) -> Result<Vec<String>>;

    /// Delete persistent warnings raised for an entity.
    async fn delete_warnings(&self, entity_type: &str, entity_id: i64) -> Result<()>;

    /// Cluster-wide configuration keys.
    async fn cluster_config(&self) -> Result<HashMap<String, String>>;

    /// Set cluster-wide configuration keys; an empty value removes the key.
    async fn update_cluster_config(&self, values: &HashMap<String, String>) -> Result<()>;
}

/// Access control list storage.
#[async_trait]
pub trait AclStore: Send + Sync {
    /// Names of the ACLs owned by `project`.
    async fn network_acl_names(&self, project: &str) -> Result<Vec<String>>;

    /// Load a single ACL.
    async fn network_acl(&self, project: &str, name: &str) -> Result<NetworkAcl>;
}
