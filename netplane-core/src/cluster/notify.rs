//! Relaying changes to the other cluster members.

use super::config::ClusterConfig;
use crate::error::{NetplaneError, Result};
use crate::state::ClusterStore;
use crate::types::{ClientOrigin, ClusterMember, NetworkPut};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Which members a notification must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyPolicy {
    /// Every member; fail upfront if one of them is offline.
    #[default]
    All,

    /// Only members that are currently online.
    Alive,
}

/// Client for the API of another cluster member.
#[async_trait]
pub trait MemberClient: Send + Sync {
    /// Push a network update to `member`.
    async fn update_network(
        &self,
        member: &ClusterMember,
        project: &str,
        name: &str,
        put: &NetworkPut,
        origin: ClientOrigin,
    ) -> Result<()>;
}

/// Sends requests to every other cluster member, one at a time.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn ClusterStore>,
    client: Arc<dyn MemberClient>,
    policy: NotifyPolicy,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        client: Arc<dyn MemberClient>,
        policy: NotifyPolicy,
    ) -> Self {
        Self { store, client, policy }
    }

    pub fn policy(&self) -> NotifyPolicy {
        self.policy
    }

    /// Members to notify under the current policy, excluding the local one.
    async fn targets(&self) -> Result<Vec<ClusterMember>> {
        let threshold = ClusterConfig::load(self.store.clone()).await?.offline_threshold();
        let local = self.store.local_member_id();

        let mut targets = Vec::new();
        for member in self.store.cluster_members().await? {
            if member.id == local {
                continue;
            }

            if member.is_offline(threshold) {
                match self.policy {
                    NotifyPolicy::All => {
                        return Err(NetplaneError::MemberOffline { member: member.name });
                    }
                    NotifyPolicy::Alive => {
                        warn!(member = %member.name, "Skipping offline cluster member");
                        continue;
                    }
                }
            }

            targets.push(member);
        }

        Ok(targets)
    }

    /// Relay a network update to the other members as a notification.
    ///
    /// Stops at the first member that fails. Returns the number of members notified.
    #[instrument(skip(self, put), fields(project = %project, network = %name))]
    pub async fn update_network(&self, project: &str, name: &str, put: &NetworkPut) -> Result<usize> {
        let targets = self.targets().await?;

        for member in &targets {
            debug!(member = %member.name, "Notifying cluster member");

            if let Err(e) = self
                .client
                .update_network(member, project, name, put, ClientOrigin::Notification)
                .await
            {
                counter!("netplane_notifications_failed_total").increment(1);
                return Err(NetplaneError::NotifyFailed {
                    member: member.name.clone(),
                    reason: e.to_string(),
                });
            }

            counter!("netplane_notifications_sent_total").increment(1);
        }

        info!(members = targets.len(), "Notified cluster members");
        Ok(targets.len())
    }
}
