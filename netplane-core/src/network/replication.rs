//! Applying network changes across the cluster.
//!
//! A change issued directly by a client is applied locally, relayed to every
//! other member as a notification and persisted. A notification is only
//! applied locally: its origin member already relayed and persisted it.

use super::common::NetworkCommon;
use crate::error::{NetplaneError, Result};
use crate::network::keys::{is_member_specific, is_user_config, MEMBER_SPECIFIC_KEYS};
use crate::state::WARNING_ENTITY_NETWORK;
use crate::types::{ClientOrigin, ConfigMap, NetworkPut};
use metrics::counter;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

/// Difference between a network's current state and a proposed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDiff {
    /// Description or config differ
    pub db_update_needed: bool,

    /// Changed non-user config keys
    pub changed_keys: BTreeSet<String>,

    /// Copy of the current state
    pub old: NetworkPut,
}

/// Strip the keys that only apply to the local member.
fn replicated_config(config: &ConfigMap) -> ConfigMap {
    config.iter().filter(|(k, _)| !is_member_specific(k)).map(|(k, v)| (k.clone(), v.clone())).collect()
}

impl NetworkCommon {
    /// Compare `new` against the current in-memory state.
    pub fn config_changed(&self, new: &NetworkPut) -> ConfigDiff {
        let old = NetworkPut { description: self.description.clone(), config: self.config.clone() };

        let mut db_update_needed = new.description != old.description;
        let mut changed_keys = BTreeSet::new();

        let keys = old.config.keys().chain(new.config.keys());
        for key in keys {
            if old.config.get(key) == new.config.get(key) {
                continue;
            }

            db_update_needed = true;
            if !is_user_config(key) {
                changed_keys.insert(key.clone());
            }
        }

        ConfigDiff { db_update_needed, changed_keys, old }
    }

    /// Fill in the local values of member-specific keys missing from `config`.
    ///
    /// Notifications arrive without them since the sender strips its own.
    pub fn merge_member_specific(&self, config: &mut ConfigMap) {
        for key in MEMBER_SPECIFIC_KEYS {
            if let Some(value) = self.config.get(*key) {
                config.entry(key.to_string()).or_insert_with(|| value.clone());
            }
        }
    }

    /// Apply `put` to this network.
    ///
    /// The in-memory state is replaced first so that relayed notifications carry
    /// the new state. With a direct origin and no target member the change is
    /// relayed to every other member, then it is persisted. On failure the
    /// previous in-memory state is restored.
    #[instrument(skip(self, put), fields(project = %self.project, network = %self.name))]
    pub async fn update(
        &mut self,
        put: NetworkPut,
        target_member: &str,
        origin: ClientOrigin,
    ) -> Result<()> {
        let previous = NetworkPut {
            description: std::mem::replace(&mut self.description, put.description.clone()),
            config: std::mem::replace(&mut self.config, put.config.clone()),
        };

        counter!("netplane_network_updates_total", "origin" => origin.to_string()).increment(1);

        if origin == ClientOrigin::Notification {
            debug!("Applied notification from cluster member");
            return Ok(());
        }

        if let Err(e) = self.replicate(&put, target_member).await {
            warn!(error = %e, "Update failed, restoring previous state");
            self.description = previous.description;
            self.config = previous.config;
            return Err(e);
        }

        info!("Applied network update");
        Ok(())
    }

    async fn replicate(&self, put: &NetworkPut, target_member: &str) -> Result<()> {
        if target_member.is_empty() {
            let send = NetworkPut {
                description: put.description.clone(),
                config: replicated_config(&put.config),
            };

            self.state.notifier.update_network(&self.project, &self.name, &send).await?;
        }

        self.state
            .store
            .update_network(&self.project, &self.name, &put.description, &put.config)
            .await
    }

    /// Rename the network's directory and record.
    #[instrument(skip(self), fields(project = %self.project, network = %self.name))]
    pub async fn rename(&mut self, new_name: &str) -> Result<()> {
        // Nothing on disk may be touched while the new name is taken.
        match self.state.store.load_network(&self.project, new_name).await {
            Ok(_) => {
                return Err(NetplaneError::NetworkAlreadyExists {
                    project: self.project.clone(),
                    name: new_name.to_string(),
                });
            }
            Err(NetplaneError::NetworkNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        if let Err(e) = self.state.dirs.remove(new_name).await {
            warn!(error = %e, "Failed clearing destination directory");
        }

        self.state.dirs.rename(&self.name, new_name).await?;
        self.state.store.rename_network(&self.project, &self.name, new_name).await?;

        info!(new_name, "Renamed network");
        self.name = new_name.to_string();

        Ok(())
    }

    /// Delete the persistent warnings raised for this network.
    pub async fn warnings_delete(&self) -> Result<()> {
        self.state.store.delete_warnings(WARNING_ENTITY_NETWORK, self.id).await
    }

    /// Clean up the network's local state.
    #[instrument(skip(self), fields(project = %self.project, network = %self.name))]
    pub async fn delete(&self, origin: ClientOrigin) -> Result<()> {
        self.warnings_delete().await?;

        if let Err(e) = self.state.dirs.remove(&self.name).await {
            warn!(error = %e, "Failed removing network directory");
        }

        self.set_available();

        info!("Deleted network");
        Ok(())
    }
}
