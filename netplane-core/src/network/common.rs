//! State and behaviour shared by every network driver.

use super::bgp::bgp_validation_rules;
use super::driver::Info;
use super::state::NetworkState;
use crate::error::{NetplaneError, Result};
use crate::network::keys::is_user_config;
use crate::types::{ConfigMap, NetworkMember, NetworkRecord, NetworkStatus, ProjectNetwork};
use crate::validate::{self, Rules};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// In-memory view of a network, embedded by every driver.
pub struct NetworkCommon {
    pub(crate) state: Arc<NetworkState>,
    pub(crate) id: i64,
    pub(crate) project: String,
    pub(crate) name: String,
    pub(crate) driver: String,
    pub(crate) description: String,
    pub(crate) config: ConfigMap,
    pub(crate) status: NetworkStatus,
    pub(crate) managed: bool,
    pub(crate) members: HashMap<i64, NetworkMember>,
}

impl NetworkCommon {
    pub fn new(state: Arc<NetworkState>, record: NetworkRecord) -> Self {
        Self {
            state,
            id: record.id,
            project: record.project,
            name: record.name,
            driver: record.driver,
            description: record.description,
            config: record.config,
            status: record.status,
            managed: record.managed,
            members: record.members,
        }
    }

    pub fn state(&self) -> &Arc<NetworkState> {
        &self.state
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Cluster-wide status.
    pub fn status(&self) -> NetworkStatus {
        self.status
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    pub fn is_managed(&self) -> bool {
        self.managed
    }

    pub fn info(&self) -> Info {
        Info { member_specific_config: true, ..Default::default() }
    }

    fn project_network(&self) -> ProjectNetwork {
        ProjectNetwork::new(self.project.as_str(), self.name.as_str())
    }

    /// Status of the network on the local member.
    pub fn local_status(&self) -> NetworkStatus {
        if !self.is_available() {
            return NetworkStatus::Unavailable;
        }

        match self.members.get(&self.state.store.local_member_id()) {
            Some(member) => member.state.status(),
            None => NetworkStatus::Unknown,
        }
    }

    /// Names of the members the network is defined on.
    pub fn locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = self.members.values().map(|m| m.name.clone()).collect();
        locations.sort();
        locations
    }

    pub fn is_available(&self) -> bool {
        self.state.unavailable.is_available(&self.project_network())
    }

    pub fn set_available(&self) {
        self.state.unavailable.mark_available(&self.project_network());
    }

    pub fn set_unavailable(&self) {
        self.state.unavailable.mark_unavailable(self.project_network());
    }

    /// Check a name is usable for a network.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(NetplaneError::InvalidName {
                name: name.to_string(),
                reason: "Name is required".to_string(),
            });
        }

        validate::is_url_segment_safe(name)
            .map_err(|reason| NetplaneError::InvalidName { name: name.to_string(), reason })?;

        if name.contains(':') {
            return Err(NetplaneError::InvalidName {
                name: name.to_string(),
                reason: format!("Cannot contain {:?}", ":"),
            });
        }

        Ok(())
    }

    /// Rules common to all drivers for `config`.
    pub fn validation_rules(&self, config: &ConfigMap) -> Result<Rules> {
        let mut rules = bgp_validation_rules(&self.name, config)?;
        rules.insert(
            "bgp.ipv4.nexthop".to_string(),
            validate::optional(validate::is_network_address_v4),
        );
        rules.insert(
            "bgp.ipv6.nexthop".to_string(),
            validate::optional(validate::is_network_address_v6),
        );
        Ok(rules)
    }

    /// Validate `config` against the common rules merged with `driver_rules`.
    ///
    /// Driver rules win on conflict. Every ruled key is checked, absent keys as
    /// empty values. Keys without a rule are rejected unless they are user keys.
    pub fn validate(&self, config: &ConfigMap, driver_rules: Rules) -> Result<()> {
        let mut rules = self.validation_rules(config)?;
        rules.extend(driver_rules);

        let mut keys: Vec<&String> = rules.keys().collect();
        keys.sort();

        for key in keys {
            let value = config.get(key).map(String::as_str).unwrap_or("");
            rules[key](value).map_err(|reason| NetplaneError::InvalidValue {
                network: self.name.clone(),
                key: key.clone(),
                reason,
            })?;
        }

        let checked: HashSet<&str> = rules.keys().map(String::as_str).collect();
        let mut unknown: Vec<&String> = config
            .keys()
            .filter(|k| !checked.contains(k.as_str()) && !is_user_config(k))
            .collect();
        unknown.sort();

        if let Some(key) = unknown.first() {
            return Err(NetplaneError::InvalidOption {
                network: self.name.clone(),
                key: key.to_string(),
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for NetworkCommon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkCommon")
            .field("id", &self.id)
            .field("project", &self.project)
            .field("name", &self.name)
            .field("driver", &self.driver)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
