//! Network peering validation and usage lookup.

use super::common::NetworkCommon;
use crate::error::{NetplaneError, Result};
use crate::network::keys::{is_user_config, split_list};
use crate::types::forward::TARGET_ADDRESS_KEY;
use crate::types::{NetworkAclRule, NetworkPeerPut, DEFAULT_PROJECT};
use tracing::instrument;

/// API version prefix of generated URLs.
const API_VERSION: &str = "1.0";

/// Subject names the ACL engine reserves for itself.
pub const RESERVED_NETWORK_SUBJECTS: &[&str] = &["internal", "external"];

/// Check a name is usable as an ACL subject.
pub fn valid_subject_name(name: &str) -> Result<()> {
    let invalid = |reason: String| NetplaneError::InvalidName { name: name.to_string(), reason };

    if name.is_empty() {
        return Err(invalid("Name is required".to_string()));
    }

    if let Some(c) = name.chars().next().filter(|c| matches!(*c, '@' | '%' | '$')) {
        return Err(invalid(format!("Name cannot start with reserved character {:?}", c)));
    }

    if name.contains(':') {
        return Err(invalid(format!("Name cannot contain {:?}", ":")));
    }

    if name == "." || name == ".." {
        return Err(invalid(format!("Name cannot be {:?}", name)));
    }

    crate::validate::is_url_segment_safe(name).map_err(invalid)
}

/// Whether any rule has a `@<network>/<peer>` source subject.
fn rules_use_peer(rules: &[NetworkAclRule], network: &str, peer: &str) -> bool {
    rules.iter().any(|rule| {
        split_list(&rule.source).into_iter().any(|subject| {
            subject
                .strip_prefix('@')
                .and_then(|s| s.split_once('/'))
                .is_some_and(|(n, p)| n == network && p == peer)
        })
    })
}

impl NetworkCommon {
    /// Validate a peering name and config.
    pub fn peer_validate(&self, name: &str, peer: &NetworkPeerPut) -> Result<()> {
        valid_subject_name(name)?;

        if RESERVED_NETWORK_SUBJECTS.contains(&name) {
            return Err(NetplaneError::InvalidName {
                name: name.to_string(),
                reason: format!(
                    "Name cannot be one of the reserved network subjects: {:?}",
                    RESERVED_NETWORK_SUBJECTS
                ),
            });
        }

        for key in peer.config.keys() {
            if key != TARGET_ADDRESS_KEY && !is_user_config(key) {
                return Err(NetplaneError::InvalidPeer { reason: format!("Invalid option {:?}", key) });
            }
        }

        Ok(())
    }

    /// API URLs of the ACLs in the network's project whose rules reference peering `name`.
    ///
    /// With `first_only` the search stops at the first match.
    #[instrument(skip(self), fields(project = %self.project, network = %self.name))]
    pub async fn peer_used_by(&self, name: &str, first_only: bool) -> Result<Vec<String>> {
        let mut used_by = Vec::new();

        for acl_name in self.state.acls.network_acl_names(&self.project).await? {
            let acl = self.state.acls.network_acl(&self.project, &acl_name).await?;

            let uses_peer = [&acl.ingress, &acl.egress]
                .into_iter()
                .any(|rules| rules_use_peer(rules, &self.name, name));
            if !uses_peer {
                continue;
            }

            used_by.push(self.acl_url(&acl_name));
            if first_only {
                break;
            }
        }

        Ok(used_by)
    }

    /// Whether any ACL references peering `name`.
    pub async fn peer_is_used(&self, name: &str) -> Result<bool> {
        Ok(!self.peer_used_by(name, true).await?.is_empty())
    }

    fn acl_url(&self, acl: &str) -> String {
        let mut url = format!("/{}/network-acls/{}", API_VERSION, acl);
        if self.project != DEFAULT_PROJECT {
            url.push_str("?project=");
            url.push_str(&self.project);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::TestEnv;
    use crate::types::NetworkAcl;

    fn acl(name: &str, ingress: &[&str], egress: &[&str]) -> NetworkAcl {
        let rule = |source: &&str| NetworkAclRule {
            action: "allow".to_string(),
            source: source.to_string(),
            ..Default::default()
        };
        NetworkAcl {
            name: name.to_string(),
            description: String::new(),
            ingress: ingress.iter().map(rule).collect(),
            egress: egress.iter().map(rule).collect(),
        }
    }

    #[tokio::test]
    async fn test_peer_validate() {
        let env = TestEnv::new().await;
        let n = env.common("br0", &[]).await;

        let mut peer = NetworkPeerPut::default();
        peer.config.insert(TARGET_ADDRESS_KEY.to_string(), "10.0.0.1".to_string());
        peer.config.insert("user.a".to_string(), "b".to_string());
        n.peer_validate("upstream", &peer).unwrap();

        for name in ["", "@peer", "%peer", "a:b", "a/b", "internal", "external", ".."] {
            assert!(n.peer_validate(name, &NetworkPeerPut::default()).is_err(), "{:?}", name);
        }

        peer.config.insert("target_network".to_string(), "x".to_string());
        assert!(matches!(
            n.peer_validate("upstream", &peer),
            Err(NetplaneError::InvalidPeer { .. })
        ));
    }

    #[tokio::test]
    async fn test_peer_used_by() {
        let env = TestEnv::new().await;
        let n = env.common("br0", &[]).await;

        env.store.create_acl("default", &acl("a", &["10.0.0.0/8, @br0/peer1"], &[])).await.unwrap();
        env.store.create_acl("default", &acl("b", &[], &["@br0/peer1"])).await.unwrap();
        env.store.create_acl("default", &acl("c", &["@br1/peer1", "@br0/peer2"], &[])).await.unwrap();
        env.store.create_acl("default", &acl("d", &["@br0"], &[])).await.unwrap();

        assert_eq!(
            n.peer_used_by("peer1", false).await.unwrap(),
            vec!["/1.0/network-acls/a", "/1.0/network-acls/b"]
        );
        assert_eq!(n.peer_used_by("peer1", true).await.unwrap(), vec!["/1.0/network-acls/a"]);

        assert!(n.peer_is_used("peer2").await.unwrap());
        assert!(!n.peer_is_used("peer3").await.unwrap());
    }

    #[tokio::test]
    async fn test_peer_used_by_project_url() {
        let env = TestEnv::new().await;
        env.store.create_project("tenant").await.unwrap();
        let n = env.common_in("tenant", "br0", &[]).await;

        env.store.create_acl("tenant", &acl("web", &["@br0/peer1"], &[])).await.unwrap();
        // ACLs of other projects are not considered.
        env.store.create_acl("default", &acl("web", &["@br0/peer1"], &[])).await.unwrap();

        assert_eq!(
            n.peer_used_by("peer1", false).await.unwrap(),
            vec!["/1.0/network-acls/web?project=tenant"]
        );
    }
}
