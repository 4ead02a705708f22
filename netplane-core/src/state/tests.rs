#[cfg(test)]
mod tests {
    use crate::error::NetplaneError;
    use crate::state::{AclStore, ClusterStore, StateManager, WARNING_ENTITY_NETWORK};
    use crate::types::{
        MemberState, NetworkAcl, NetworkAclRule, NetworkForwardPut, NetworkPut, NetworkStatus,
    };
    use std::collections::HashMap;
    use std::time::{Duration, SystemTime};

    fn put(description: &str, config: &[(&str, &str)]) -> NetworkPut {
        NetworkPut {
            description: description.to_string(),
            config: config.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[tokio::test]
    async fn test_state_manager_init() {
        let manager = StateManager::new_in_memory().await.unwrap();
        assert_eq!(manager.project_names().await.unwrap(), vec!["default".to_string()]);
    }

    #[tokio::test]
    async fn test_file_backed_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state").join("netplane.db");

        {
            let manager = StateManager::new(&db_path).await.unwrap();
            manager.create_network("default", "br0", "bridge", &put("", &[])).await.unwrap();
        }

        // Reopening must not re-run migrations destructively.
        let manager = StateManager::new(&db_path).await.unwrap();
        let record = manager.load_network("default", "br0").await.unwrap();
        assert_eq!(record.driver, "bridge");
    }

    #[tokio::test]
    async fn test_create_and_load_network() {
        let manager = StateManager::new_in_memory().await.unwrap();
        let member = manager.create_member("node1", "10.0.0.1:8443").await.unwrap();
        let manager = manager.with_local_member(member);

        let id = manager
            .create_network(
                "default",
                "br0",
                "bridge",
                &put("uplink", &[("ipv4.address", "10.0.0.1/24"), ("parent", "eth0")]),
            )
            .await
            .unwrap();
        manager.set_network_member_state(id, member, MemberState::Created).await.unwrap();
        manager.set_network_state(id, MemberState::Created).await.unwrap();

        let record = manager.load_network("default", "br0").await.unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.description, "uplink");
        assert_eq!(record.status, NetworkStatus::Created);
        assert_eq!(record.config.get("ipv4.address").map(String::as_str), Some("10.0.0.1/24"));
        assert_eq!(record.config.get("parent").map(String::as_str), Some("eth0"));
        assert_eq!(record.members[&member].name, "node1");
        assert_eq!(record.members[&member].state, MemberState::Created);
    }

    #[tokio::test]
    async fn test_duplicate_network_name() {
        let manager = StateManager::new_in_memory().await.unwrap();
        manager.create_network("default", "br0", "bridge", &put("", &[])).await.unwrap();

        let err = manager.create_network("default", "br0", "bridge", &put("", &[])).await;
        assert!(matches!(err, Err(NetplaneError::NetworkAlreadyExists { .. })));

        // Same name in another project is fine.
        manager.create_project("other").await.unwrap();
        manager.create_network("other", "br0", "bridge", &put("", &[])).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_missing_network() {
        let manager = StateManager::new_in_memory().await.unwrap();
        let err = manager.load_network("default", "missing").await;
        assert!(matches!(err, Err(NetplaneError::NetworkNotFound { .. })));
    }

    #[tokio::test]
    async fn test_member_specific_config_is_local() {
        let manager = StateManager::new_in_memory().await.unwrap();
        let node1 = manager.create_member("node1", "10.0.0.1:8443").await.unwrap();
        let node2 = manager.create_member("node2", "10.0.0.2:8443").await.unwrap();

        let on_node1 = manager.clone().with_local_member(node1);
        let on_node2 = manager.clone().with_local_member(node2);

        on_node1
            .create_network("default", "br0", "bridge", &put("", &[("parent", "eth0")]))
            .await
            .unwrap();
        on_node2
            .update_network(
                "default",
                "br0",
                "",
                &[("parent".to_string(), "eth1".to_string())].into_iter().collect(),
            )
            .await
            .unwrap();

        let seen_by_1 = on_node1.load_network("default", "br0").await.unwrap();
        let seen_by_2 = on_node2.load_network("default", "br0").await.unwrap();
        assert_eq!(seen_by_1.config["parent"], "eth0");
        assert_eq!(seen_by_2.config["parent"], "eth1");
    }

    #[tokio::test]
    async fn test_update_network_replaces_config() {
        let manager = StateManager::new_in_memory().await.unwrap();
        manager
            .create_network(
                "default",
                "br0",
                "bridge",
                &put("", &[("ipv4.address", "10.0.0.1/24"), ("ipv4.nat", "true")]),
            )
            .await
            .unwrap();

        let config = [("ipv4.address".to_string(), "10.1.0.1/24".to_string())]
            .into_iter()
            .collect();
        manager.update_network("default", "br0", "updated", &config).await.unwrap();

        let record = manager.load_network("default", "br0").await.unwrap();
        assert_eq!(record.description, "updated");
        assert_eq!(record.config, config);
    }

    #[tokio::test]
    async fn test_rename_network() {
        let manager = StateManager::new_in_memory().await.unwrap();
        manager.create_network("default", "br0", "bridge", &put("", &[])).await.unwrap();
        manager.create_network("default", "br1", "bridge", &put("", &[])).await.unwrap();

        let err = manager.rename_network("default", "br0", "br1").await;
        assert!(matches!(err, Err(NetplaneError::NetworkAlreadyExists { .. })));

        manager.rename_network("default", "br0", "lan").await.unwrap();
        assert!(manager.load_network("default", "lan").await.is_ok());
        assert!(manager.load_network("default", "br0").await.is_err());
    }

    #[tokio::test]
    async fn test_created_networks() {
        let manager = StateManager::new_in_memory().await.unwrap();
        let a = manager.create_network("default", "a", "bridge", &put("", &[])).await.unwrap();
        manager.create_network("default", "b", "bridge", &put("", &[])).await.unwrap();
        manager.set_network_state(a, MemberState::Created).await.unwrap();

        assert_eq!(manager.created_networks("default").await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_forward_listen_addresses() {
        let manager = StateManager::new_in_memory().await.unwrap();
        let node1 = manager.create_member("node1", "10.0.0.1:8443").await.unwrap();
        let node2 = manager.create_member("node2", "10.0.0.2:8443").await.unwrap();
        let manager = manager.with_local_member(node1);

        let id = manager.create_network("default", "br0", "bridge", &put("", &[])).await.unwrap();
        let forward = NetworkForwardPut::default();
        manager.create_forward(id, None, "192.0.2.1", &forward).await.unwrap();
        manager.create_forward(id, Some(node1), "192.0.2.2", &forward).await.unwrap();
        manager.create_forward(id, Some(node2), "192.0.2.3", &forward).await.unwrap();

        assert_eq!(
            manager.forward_listen_addresses(id, true).await.unwrap(),
            vec!["192.0.2.1", "192.0.2.2"]
        );
        assert_eq!(manager.forward_listen_addresses(id, false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_warnings() {
        let manager = StateManager::new_in_memory().await.unwrap();
        manager.create_warning(WARNING_ENTITY_NETWORK, 7, "offline", "gone").await.unwrap();
        manager.create_warning(WARNING_ENTITY_NETWORK, 8, "offline", "gone").await.unwrap();

        manager.delete_warnings(WARNING_ENTITY_NETWORK, 7).await.unwrap();

        assert_eq!(manager.count_warnings(WARNING_ENTITY_NETWORK, 7).await.unwrap(), 0);
        assert_eq!(manager.count_warnings(WARNING_ENTITY_NETWORK, 8).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cluster_config() {
        let manager = StateManager::new_in_memory().await.unwrap();

        let mut values = HashMap::new();
        values.insert("core.bgp_asn".to_string(), "65000".to_string());
        values.insert("cluster.offline_threshold".to_string(), "30".to_string());
        manager.update_cluster_config(&values).await.unwrap();

        let mut values = HashMap::new();
        values.insert("cluster.offline_threshold".to_string(), String::new());
        manager.update_cluster_config(&values).await.unwrap();

        let config = manager.cluster_config().await.unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config["core.bgp_asn"], "65000");
    }

    #[tokio::test]
    async fn test_member_heartbeat() {
        let manager = StateManager::new_in_memory().await.unwrap();
        let id = manager.create_member("node1", "10.0.0.1:8443").await.unwrap();

        let stale = SystemTime::now() - Duration::from_secs(120);
        manager.set_member_heartbeat(id, stale).await.unwrap();

        let members = manager.cluster_members().await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].is_offline(Duration::from_secs(20)));
    }

    #[tokio::test]
    async fn test_acls() {
        let manager = StateManager::new_in_memory().await.unwrap();
        let acl = NetworkAcl {
            name: "web".to_string(),
            description: "web servers".to_string(),
            ingress: vec![NetworkAclRule {
                action: "allow".to_string(),
                source: "@br0/peer1".to_string(),
                ..Default::default()
            }],
            egress: vec![],
        };
        manager.create_acl("default", &acl).await.unwrap();

        assert_eq!(manager.network_acl_names("default").await.unwrap(), vec!["web".to_string()]);
        assert_eq!(manager.network_acl("default", "web").await.unwrap(), acl);

        let err = manager.network_acl("default", "db").await;
        assert!(matches!(err, Err(NetplaneError::NotFound { .. })));
    }
}
