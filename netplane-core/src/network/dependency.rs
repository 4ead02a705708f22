//! Telling dependent networks about changes to the network they depend on.

use super::common::NetworkCommon;
use crate::network::keys::DEPENDENCY_KEY;
use crate::types::DEFAULT_PROJECT;
use metrics::counter;
use std::collections::BTreeSet;
use tracing::{debug, error, instrument};

impl NetworkCommon {
    /// Call `handle_dependency_change` on every created network whose
    /// `network` key names this one.
    ///
    /// Only networks of the default project can be depended on. Failures are
    /// logged and never stop the remaining networks from being notified.
    #[instrument(skip(self, changed_keys), fields(project = %self.project, network = %self.name))]
    pub async fn notify_dependent_networks(&self, changed_keys: &BTreeSet<String>) {
        if self.project != DEFAULT_PROJECT {
            return;
        }

        let projects = match self.state.store.project_names().await {
            Ok(projects) => projects,
            Err(e) => {
                error!(error = %e, "Failed to load projects");
                return;
            }
        };

        for project in projects {
            let names = match self.state.store.created_networks(&project).await {
                Ok(names) => names,
                Err(e) => {
                    error!(%project, error = %e, "Failed to load networks in project");
                    continue;
                }
            };

            for name in names {
                let dependent = match self.state.loader.load_by_name(&self.state, &project, &name).await
                {
                    Ok(dependent) => dependent,
                    Err(e) => {
                        error!(%project, dependent = %name, error = %e, "Failed to load dependent network");
                        continue;
                    }
                };

                if dependent.common().config().get(DEPENDENCY_KEY).map(String::as_str)
                    != Some(self.name.as_str())
                {
                    continue;
                }

                debug!(%project, dependent = %name, "Notifying dependent network");

                if let Err(e) =
                    dependent.handle_dependency_change(&self.name, &self.config, changed_keys).await
                {
                    counter!("netplane_dependency_notifications_failed_total").increment(1);
                    error!(%project, dependent = %name, error = %e, "Failed notifying dependent network");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::network::testing::TestEnv;
    use std::collections::BTreeSet;

    fn keys(k: &[&str]) -> BTreeSet<String> {
        k.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_notifies_dependents_across_projects() {
        let env = TestEnv::new().await;
        env.store.create_project("tenant").await.unwrap();

        let uplink = env.common("uplink", &[]).await;
        env.common("ovn0", &[("network", "uplink")]).await;
        env.common_in("tenant", "ovn1", &[("network", "uplink")]).await;
        env.common("other", &[("network", "elsewhere")]).await;

        uplink.notify_dependent_networks(&keys(&["ipv4.routes"])).await;

        let mut seen = env.loader.dependency_changes();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("default/ovn0".to_string(), "uplink".to_string(), keys(&["ipv4.routes"])),
                ("tenant/ovn1".to_string(), "uplink".to_string(), keys(&["ipv4.routes"])),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_dependent_does_not_block_others() {
        let env = TestEnv::new().await;

        let uplink = env.common("uplink", &[]).await;
        env.common("a", &[("network", "uplink")]).await;
        env.common("b", &[("network", "uplink")]).await;
        env.loader.fail_for("a");

        uplink.notify_dependent_networks(&keys(&["mtu"])).await;

        let seen: Vec<String> = env.loader.dependency_changes().into_iter().map(|c| c.0).collect();
        assert_eq!(seen, vec!["default/b".to_string()]);
    }

    #[tokio::test]
    async fn test_non_default_project_has_no_dependents() {
        let env = TestEnv::new().await;
        env.store.create_project("tenant").await.unwrap();

        let uplink = env.common_in("tenant", "uplink", &[]).await;
        env.common_in("tenant", "ovn0", &[("network", "uplink")]).await;

        uplink.notify_dependent_networks(&keys(&["mtu"])).await;
        assert!(env.loader.dependency_changes().is_empty());
    }
}
