//! Fixtures shared by the network unit tests.

use super::common::NetworkCommon;
use super::driver::{Network, NetworkLoader};
use super::state::NetworkState;
use super::{NetworkDirs, UnavailableNetworks};
use crate::bgp::RouteTable;
use crate::cluster::{MemberClient, Notifier, NotifyPolicy};
use crate::error::{NetplaneError, Result};
use crate::state::{ClusterStore, StateManager};
use crate::types::{
    ClientOrigin, ClusterMember, ConfigMap, MemberState, NetworkPut, DEFAULT_PROJECT,
};
use crate::validate::{self, Rules};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub(crate) fn config(pairs: &[(&str, &str)]) -> ConfigMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub(crate) fn put(description: &str, pairs: &[(&str, &str)]) -> NetworkPut {
    NetworkPut { description: description.to_string(), config: config(pairs) }
}

/// A network update received by a member.
#[derive(Debug, Clone)]
pub(crate) struct NotifyCall {
    pub member: String,
    pub put: NetworkPut,
    pub origin: ClientOrigin,
}

/// Member client recording every call.
#[derive(Default)]
pub(crate) struct RecordingClient {
    calls: Mutex<Vec<NotifyCall>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingClient {
    pub fn calls(&self) -> Vec<NotifyCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_on(&self, member: &str) {
        *self.fail_on.lock().unwrap() = Some(member.to_string());
    }
}

#[async_trait]
impl MemberClient for RecordingClient {
    async fn update_network(
        &self,
        member: &ClusterMember,
        _project: &str,
        _name: &str,
        put: &NetworkPut,
        origin: ClientOrigin,
    ) -> Result<()> {
        if self.fail_on.lock().unwrap().as_deref() == Some(member.name.as_str()) {
            return Err(NetplaneError::Internal("connection refused".to_string()));
        }

        self.calls.lock().unwrap().push(NotifyCall {
            member: member.name.clone(),
            put: put.clone(),
            origin,
        });
        Ok(())
    }
}

type DependencyChange = (String, String, BTreeSet<String>);

/// Driver with bridge-like config keys recording dependency changes.
pub(crate) struct TestDriver {
    common: NetworkCommon,
    changes: Arc<Mutex<Vec<DependencyChange>>>,
    fail_for: Arc<Mutex<HashSet<String>>>,
}

#[async_trait]
impl Network for TestDriver {
    fn common(&self) -> &NetworkCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut NetworkCommon {
        &mut self.common
    }

    fn validation_rules(&self, _config: &ConfigMap) -> Result<Rules> {
        let mut rules = Rules::new();
        for version in ["ipv4", "ipv6"] {
            rules.insert(
                format!("{}.address", version),
                validate::optional(|v: &str| {
                    if v == "none" {
                        return Ok(());
                    }
                    validate::is_network_address_cidr(v)
                }),
            );
            rules.insert(format!("{}.nat", version), validate::optional(validate::is_bool));
            rules.insert(
                format!("{}.nat.address", version),
                validate::optional(validate::is_network_address),
            );
            rules.insert(
                format!("volatile.network.{}.address", version),
                validate::optional(validate::is_network_address),
            );
        }
        rules.insert("network".to_string(), validate::optional(validate::is_any));
        rules.insert("parent".to_string(), validate::optional(validate::is_any));
        Ok(rules)
    }

    async fn handle_dependency_change(
        &self,
        network: &str,
        _config: &ConfigMap,
        changed_keys: &BTreeSet<String>,
    ) -> Result<()> {
        if self.fail_for.lock().unwrap().contains(self.common.name()) {
            return Err(NetplaneError::Internal("dependent broken".to_string()));
        }

        self.changes.lock().unwrap().push((
            format!("{}/{}", self.common.project(), self.common.name()),
            network.to_string(),
            changed_keys.clone(),
        ));
        Ok(())
    }
}

/// Loader building [`TestDriver`]s that share one change log.
#[derive(Default)]
pub(crate) struct TestLoader {
    changes: Arc<Mutex<Vec<DependencyChange>>>,
    fail_for: Arc<Mutex<HashSet<String>>>,
}

impl TestLoader {
    pub fn dependency_changes(&self) -> Vec<DependencyChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn fail_for(&self, name: &str) {
        self.fail_for.lock().unwrap().insert(name.to_string());
    }

    fn wrap(&self, common: NetworkCommon) -> TestDriver {
        TestDriver { common, changes: self.changes.clone(), fail_for: self.fail_for.clone() }
    }
}

#[async_trait]
impl NetworkLoader for TestLoader {
    async fn load_by_name(
        &self,
        state: &Arc<NetworkState>,
        project: &str,
        name: &str,
    ) -> Result<Box<dyn Network>> {
        let record = state.store.load_network(project, name).await?;
        Ok(Box::new(self.wrap(NetworkCommon::new(state.clone(), record))))
    }
}

/// Three member cluster seen from `node1`.
pub(crate) struct TestEnv {
    pub state: Arc<NetworkState>,
    pub store: Arc<StateManager>,
    pub bgp: Arc<RouteTable>,
    pub client: Arc<RecordingClient>,
    pub loader: Arc<TestLoader>,
    _dir: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        let manager = StateManager::new_in_memory().await.unwrap();
        let local = manager.create_member("node1", "10.0.0.1:8443").await.unwrap();
        manager.create_member("node2", "10.0.0.2:8443").await.unwrap();
        manager.create_member("node3", "10.0.0.3:8443").await.unwrap();
        let store = Arc::new(manager.with_local_member(local));

        let bgp = Arc::new(RouteTable::new());
        let client = Arc::new(RecordingClient::default());
        let loader = Arc::new(TestLoader::default());
        let dir = TempDir::new().unwrap();

        let state = Arc::new(NetworkState {
            store: store.clone(),
            acls: store.clone(),
            bgp: bgp.clone(),
            notifier: Notifier::new(store.clone(), client.clone(), NotifyPolicy::All),
            loader: loader.clone(),
            dirs: NetworkDirs::new(dir.path().join("networks")),
            unavailable: UnavailableNetworks::new(),
        });

        Self { state, store, bgp, client, loader, _dir: dir }
    }

    /// Create a network placed on the local member and load it.
    pub async fn common_in(
        &self,
        project: &str,
        name: &str,
        pairs: &[(&str, &str)],
    ) -> NetworkCommon {
        let id = self.store.create_network(project, name, "test", &put("", pairs)).await.unwrap();
        self.store
            .set_network_member_state(id, self.store.local_member_id(), MemberState::Created)
            .await
            .unwrap();
        self.store.set_network_state(id, MemberState::Created).await.unwrap();

        let record = self.store.load_network(project, name).await.unwrap();
        NetworkCommon::new(self.state.clone(), record)
    }

    pub async fn common(&self, name: &str, pairs: &[(&str, &str)]) -> NetworkCommon {
        self.common_in(DEFAULT_PROJECT, name, pairs).await
    }

    pub async fn driver(&self, name: &str, pairs: &[(&str, &str)]) -> TestDriver {
        let common = self.common(name, pairs).await;
        self.loader.wrap(common)
    }
}
