//! The contract between the network layer and concrete drivers.

use super::common::NetworkCommon;
use super::state::NetworkState;
use crate::error::{NetplaneError, Result};
use crate::types::{
    ClientOrigin, ConfigMap, NetworkForwardPut, NetworkForwardsPost, NetworkLease,
    NetworkPeerPut, NetworkPeersPost, NetworkPut,
};
use crate::validate::Rules;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Capabilities of a network driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Networks can be created in projects other than the default one
    pub projects: bool,

    /// Some config keys are set per member
    pub member_specific_config: bool,

    /// Address forwards are supported
    pub address_forwards: bool,

    /// Network peerings are supported
    pub peering: bool,
}

/// A network driver instance.
///
/// Drivers embed a [`NetworkCommon`] and override what they support; every
/// optional capability defaults to [`NetplaneError::NotImplemented`].
#[async_trait]
pub trait Network: Send + Sync {
    fn common(&self) -> &NetworkCommon;

    fn common_mut(&mut self) -> &mut NetworkCommon;

    fn info(&self) -> Info {
        self.common().info()
    }

    /// Driver specific validation rules for `config`.
    fn validation_rules(&self, _config: &ConfigMap) -> Result<Rules> {
        Ok(Rules::new())
    }

    /// Validate a full network config.
    fn validate(&self, config: &ConfigMap) -> Result<()> {
        let rules = self.validation_rules(config)?;
        self.common().validate(config, rules)
    }

    /// Fill in default values for a new network.
    async fn fill_config(&self, _config: &mut ConfigMap) -> Result<()> {
        Ok(())
    }

    async fn create(&self, origin: ClientOrigin) -> Result<()> {
        debug!(network = %self.common().name(), %origin, "Create");
        Ok(())
    }

    /// Apply a new description and config.
    ///
    /// A notification keeps this member's values of member-specific keys.
    /// Unchanged input is a no-op. Otherwise the config is validated and
    /// replicated, then BGP state is recomputed and dependent networks are
    /// told which keys changed. Failures of the last two steps are logged only.
    async fn update(
        &mut self,
        put: NetworkPut,
        target_member: &str,
        origin: ClientOrigin,
    ) -> Result<()> {
        let mut put = put;
        if origin == ClientOrigin::Notification {
            self.common().merge_member_specific(&mut put.config);
        }

        let diff = self.common().config_changed(&put);
        if !diff.db_update_needed {
            debug!(network = %self.common().name(), "No changes to apply");
            return Ok(());
        }

        self.validate(&put.config)?;

        self.common_mut().update(put, target_member, origin).await?;

        let common = self.common();
        if let Err(e) = common.bgp_setup(Some(&diff.old.config)).await {
            warn!(network = %common.name(), error = %e, "Failed refreshing BGP state");
        }

        common.notify_dependent_networks(&diff.changed_keys).await;

        info!(
            project = %common.project(),
            network = %common.name(),
            changed = diff.changed_keys.len(),
            "Network updated"
        );
        Ok(())
    }

    async fn rename(&mut self, new_name: &str) -> Result<()> {
        NetworkCommon::validate_name(new_name)?;
        self.common_mut().rename(new_name).await
    }

    async fn delete(&mut self, origin: ClientOrigin) -> Result<()> {
        let config = self.common().config().clone();
        if let Err(e) = self.common().bgp_clear(&config).await {
            warn!(network = %self.common().name(), error = %e, "Failed clearing BGP state");
        }

        self.common().delete(origin).await
    }

    /// React to a change of a network this one depends on.
    async fn handle_dependency_change(
        &self,
        _network: &str,
        _config: &ConfigMap,
        _changed_keys: &BTreeSet<String>,
    ) -> Result<()> {
        Ok(())
    }

    async fn forward_create(
        &self,
        _forward: NetworkForwardsPost,
        _origin: ClientOrigin,
    ) -> Result<()> {
        Err(NetplaneError::NotImplemented)
    }

    async fn forward_update(
        &self,
        _listen_address: &str,
        _forward: NetworkForwardPut,
        _origin: ClientOrigin,
    ) -> Result<()> {
        Err(NetplaneError::NotImplemented)
    }

    async fn forward_delete(&self, _listen_address: &str, _origin: ClientOrigin) -> Result<()> {
        Err(NetplaneError::NotImplemented)
    }

    async fn leases(&self, _project: &str, _origin: ClientOrigin) -> Result<Vec<NetworkLease>> {
        Err(NetplaneError::NotImplemented)
    }

    async fn peer_create(&self, _peer: NetworkPeersPost) -> Result<()> {
        Err(NetplaneError::NotImplemented)
    }

    async fn peer_update(&self, _name: &str, _peer: NetworkPeerPut) -> Result<()> {
        Err(NetplaneError::NotImplemented)
    }

    async fn peer_delete(&self, _name: &str) -> Result<()> {
        Err(NetplaneError::NotImplemented)
    }

    /// API URLs of the ACLs referencing peering `name`.
    async fn peer_used_by(&self, name: &str) -> Result<Vec<String>> {
        self.common().peer_used_by(name, false).await
    }
}

/// Instantiates the driver of a stored network.
#[async_trait]
pub trait NetworkLoader: Send + Sync {
    async fn load_by_name(
        &self,
        state: &Arc<NetworkState>,
        project: &str,
        name: &str,
    ) -> Result<Box<dyn Network>>;
}

/// Constructor of a driver around its common state.
pub type DriverFactory = fn(NetworkCommon) -> Box<dyn Network>;

/// Loader dispatching on the driver type stored with each network.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, driver: impl Into<String>, factory: DriverFactory) {
        self.drivers.insert(driver.into(), factory);
    }

    pub fn drivers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl NetworkLoader for DriverRegistry {
    #[instrument(skip(self, state))]
    async fn load_by_name(
        &self,
        state: &Arc<NetworkState>,
        project: &str,
        name: &str,
    ) -> Result<Box<dyn Network>> {
        let record = state.store.load_network(project, name).await?;

        let factory = self.drivers.get(&record.driver).ok_or_else(|| NetplaneError::NotFound {
            kind: "Network driver",
            name: record.driver.clone(),
        })?;

        Ok(factory(NetworkCommon::new(state.clone(), record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{put, TestEnv};
    use crate::state::ClusterStore;
    use crate::types::{MemberState, DEFAULT_PROJECT};
    use ipnet::IpNet;

    struct Plain(NetworkCommon);

    #[async_trait]
    impl Network for Plain {
        fn common(&self) -> &NetworkCommon {
            &self.0
        }

        fn common_mut(&mut self) -> &mut NetworkCommon {
            &mut self.0
        }
    }

    fn plain(common: NetworkCommon) -> Box<dyn Network> {
        Box::new(Plain(common))
    }

    #[tokio::test]
    async fn test_update_flow() {
        let env = TestEnv::new().await;
        let mut uplink = env.driver("uplink", &[("ipv4.address", "10.10.10.1/24")]).await;
        env.common("ovn0", &[("network", "uplink")]).await;

        let new = put(
            "",
            &[
                ("ipv4.address", "10.20.0.1/16"),
                ("bgp.peers.up.address", "192.0.2.254"),
                ("bgp.peers.up.asn", "64512"),
                ("user.owner", "ops"),
            ],
        );
        uplink.update(new, "", ClientOrigin::Direct).await.unwrap();

        assert_eq!(env.client.calls().len(), 2);

        let peers = env.bgp.peers().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].asn, 64512);

        let owner = uplink.common().bgp_owner();
        let prefixes = env.bgp.prefixes_by_owner(&owner).await;
        assert_eq!(prefixes.len(), 1);
        assert_eq!(prefixes[0].subnet, "10.20.0.0/16".parse::<IpNet>().unwrap());

        let changes = env.loader.dependency_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "default/ovn0");
        assert_eq!(
            changes[0].2.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["bgp.peers.up.address", "bgp.peers.up.asn", "ipv4.address"]
        );
    }

    #[tokio::test]
    async fn test_notification_keeps_member_specific_keys() {
        let env = TestEnv::new().await;
        let mut n = env
            .driver(
                "br0",
                &[
                    ("ipv4.address", "10.10.10.1/24"),
                    ("parent", "eth0"),
                    ("bgp.ipv4.nexthop", "192.0.2.1"),
                ],
            )
            .await;
        n.common().bgp_setup(None).await.unwrap();

        n.update(put("", &[("ipv4.address", "10.20.0.1/16")]), "", ClientOrigin::Notification)
            .await
            .unwrap();

        let config = n.common().config();
        assert_eq!(config["ipv4.address"], "10.20.0.1/16");
        assert_eq!(config["parent"], "eth0");
        assert_eq!(config["bgp.ipv4.nexthop"], "192.0.2.1");

        let prefixes = env.bgp.prefixes_by_owner(&n.common().bgp_owner()).await;
        assert_eq!(prefixes.len(), 1);
        assert_eq!(prefixes[0].subnet, "10.20.0.0/16".parse::<IpNet>().unwrap());
        assert_eq!(prefixes[0].next_hop, "192.0.2.1".parse::<std::net::IpAddr>().unwrap());
        assert!(env.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_config() {
        let env = TestEnv::new().await;
        let mut n = env.driver("br0", &[("ipv4.address", "10.0.0.1/24")]).await;

        let err = n.update(put("", &[("bogus", "1")]), "", ClientOrigin::Direct).await.unwrap_err();
        assert!(err.is_validation(), "{err}");

        assert!(env.client.calls().is_empty());
        assert_eq!(n.common().config()["ipv4.address"], "10.0.0.1/24");
    }

    #[tokio::test]
    async fn test_update_unchanged_is_noop() {
        let env = TestEnv::new().await;
        let mut n = env.driver("br0", &[("ipv4.address", "10.0.0.1/24")]).await;

        n.update(put("", &[("ipv4.address", "10.0.0.1/24")]), "", ClientOrigin::Direct)
            .await
            .unwrap();
        assert!(env.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rename_validates_name() {
        let env = TestEnv::new().await;
        let mut n = env.driver("br0", &[]).await;

        assert!(matches!(n.rename("a:b").await, Err(NetplaneError::InvalidName { .. })));
        n.rename("lan").await.unwrap();
        assert_eq!(n.common().name(), "lan");
    }

    #[tokio::test]
    async fn test_delete_clears_bgp() {
        let env = TestEnv::new().await;
        let mut n = env
            .driver(
                "br0",
                &[
                    ("ipv4.address", "10.10.10.1/24"),
                    ("bgp.peers.up.address", "192.0.2.254"),
                    ("bgp.peers.up.asn", "64512"),
                ],
            )
            .await;
        n.common().bgp_setup(None).await.unwrap();
        assert!(!env.bgp.prefixes().await.is_empty());

        n.delete(ClientOrigin::Direct).await.unwrap();

        assert!(env.bgp.peers().await.is_empty());
        assert!(env.bgp.prefixes().await.is_empty());
    }

    #[tokio::test]
    async fn test_optional_capabilities() {
        let env = TestEnv::new().await;
        let n = Plain(env.common("br0", &[]).await);

        assert_eq!(n.info(), Info { member_specific_config: true, ..Default::default() });
        assert!(n.forward_delete("198.51.100.1", ClientOrigin::Direct).await.unwrap_err().is_not_implemented());
        assert!(n.leases(DEFAULT_PROJECT, ClientOrigin::Direct).await.unwrap_err().is_not_implemented());
        assert!(n.peer_delete("p1").await.unwrap_err().is_not_implemented());
        assert!(n.peer_used_by("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_loads_by_driver() {
        let env = TestEnv::new().await;
        env.common("br0", &[]).await;

        let mut registry = DriverRegistry::new();
        registry.register("test", plain);
        assert_eq!(registry.drivers(), vec!["test"]);

        let n = registry.load_by_name(&env.state, DEFAULT_PROJECT, "br0").await.unwrap();
        assert_eq!(n.common().name(), "br0");
        assert_eq!(n.common().driver(), "test");

        let id = env.store.create_network(DEFAULT_PROJECT, "mv0", "macvlan", &put("", &[])).await.unwrap();
        env.store.set_network_state(id, MemberState::Created).await.unwrap();
        let err = registry.load_by_name(&env.state, DEFAULT_PROJECT, "mv0").await.err();
        assert!(matches!(err, Some(NetplaneError::NotFound { kind: "Network driver", .. })));

        assert!(registry.load_by_name(&env.state, DEFAULT_PROJECT, "missing").await.is_err());
        assert_eq!(env.store.created_networks(DEFAULT_PROJECT).await.unwrap(), vec!["br0", "mv0"]);
    }
}
