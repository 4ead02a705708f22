//! State management with SQLite persistence.
//!
//! The StateManager is the cluster database of a member:
//! - Cluster members and their heartbeats
//! - Projects
//! - Networks, their per-member placement and config
//! - Network forwards and ACLs
//! - Persistent warnings
//! - Cluster-wide configuration

use crate::error::{NetplaneError, Result};
use crate::network::keys::is_member_specific;
use crate::types::{
    ClusterMember, ConfigMap, MemberState, NetworkAcl, NetworkForwardPut, NetworkMember,
    NetworkPut, NetworkRecord, NetworkStatus,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument};

pub mod migrations;
pub mod store;

pub use store::{AclStore, ClusterStore, WARNING_ENTITY_NETWORK};

#[cfg(test)]
mod tests;

const MEMORY_DB: &str = ":memory:";

/// Map a sqlx error to a database error, counting it per operation.
fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> NetplaneError {
    move |e| {
        metrics::counter!("netplane_db_errors_total", "operation" => operation).increment(1);
        NetplaneError::DatabaseError(e.to_string())
    }
}

fn to_unix_secs(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn from_unix_secs(secs: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

/// State manager for persistent storage.
#[derive(Clone)]
pub struct StateManager {
    pool: SqlitePool,
    local_member_id: i64,
}

impl StateManager {
    /// Create a new StateManager with an in-memory database (for tests).
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(MEMORY_DB).await
    }

    /// Get a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a new StateManager with a database at the specified path.
    ///
    /// The local member ID defaults to 1; see [`StateManager::with_local_member`].
    #[instrument(skip(db_path))]
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Initializing state manager at {:?}", db_path);

        let in_memory = db_path == Path::new(MEMORY_DB);

        // Create parent directory if it doesn't exist (but not for :memory:)
        if !in_memory {
            if let Some(parent) = db_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| NetplaneError::IoError { path: parent.to_path_buf(), source: e })?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_path.to_str().ok_or_else(|| {
            NetplaneError::InvalidConfig { reason: "Invalid database path".to_string() }
        })?)
        .map_err(|e| NetplaneError::DatabaseError(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true);

        // Every connection to :memory: is a separate database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| NetplaneError::DatabaseError(e.to_string()))?;

        let manager = Self { pool, local_member_id: 1 };

        info!("Running database migrations");
        migrations::run(&manager.pool).await?;

        info!("State manager initialized successfully");
        Ok(manager)
    }

    /// Set the ID of the member this database belongs to.
    pub fn with_local_member(mut self, member_id: i64) -> Self {
        self.local_member_id = member_id;
        self
    }

    // ========================
    // Members and projects
    // ========================

    /// Add a cluster member.
    #[instrument(skip(self))]
    pub async fn create_member(&self, name: &str, address: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO nodes (name, address, heartbeat) VALUES (?, ?, ?)")
            .bind(name)
            .bind(address)
            .bind(to_unix_secs(SystemTime::now()))
            .execute(&self.pool)
            .await
            .map_err(db_error("create_member"))?;

        Ok(result.last_insert_rowid())
    }

    /// Record a heartbeat received from a member.
    #[instrument(skip(self))]
    pub async fn set_member_heartbeat(&self, member_id: i64, heartbeat: SystemTime) -> Result<()> {
        sqlx::query("UPDATE nodes SET heartbeat = ? WHERE id = ?")
            .bind(to_unix_secs(heartbeat))
            .bind(member_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("set_member_heartbeat"))?;

        Ok(())
    }

    /// Add a project.
    #[instrument(skip(self))]
    pub async fn create_project(&self, name: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO projects (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_error("create_project"))?;

        Ok(result.last_insert_rowid())
    }

    async fn project_id(&self, project: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM projects WHERE name = ?")
            .bind(project)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("project_id"))?
            .ok_or_else(|| NetplaneError::NotFound { kind: "Project", name: project.to_string() })
    }

    // ========================
    // Networks
    // ========================

    /// Insert a new network in pending state.
    #[instrument(skip(self, put), fields(project = %project, network = %name))]
    pub async fn create_network(
        &self,
        project: &str,
        name: &str,
        driver: &str,
        put: &NetworkPut,
    ) -> Result<i64> {
        let project_id = self.project_id(project).await?;

        let mut tx = self.pool.begin().await.map_err(db_error("create_network"))?;

        let result = sqlx::query(
            "INSERT INTO networks (project_id, name, type, description, state) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(name)
        .bind(driver)
        .bind(&put.description)
        .bind(MemberState::Pending.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                NetplaneError::NetworkAlreadyExists {
                    project: project.to_string(),
                    name: name.to_string(),
                }
            }
            e => db_error("create_network")(e),
        })?;

        let network_id = result.last_insert_rowid();
        self.insert_config(&mut tx, network_id, &put.config).await?;

        tx.commit().await.map_err(db_error("create_network"))?;

        info!(network_id, "Created network record");
        Ok(network_id)
    }

    /// Set the cluster-wide state of a network.
    #[instrument(skip(self))]
    pub async fn set_network_state(&self, network_id: i64, state: MemberState) -> Result<()> {
        sqlx::query("UPDATE networks SET state = ? WHERE id = ?")
            .bind(state.as_i64())
            .bind(network_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("set_network_state"))?;

        Ok(())
    }

    /// Record a network's placement state on a member.
    #[instrument(skip(self))]
    pub async fn set_network_member_state(
        &self,
        network_id: i64,
        member_id: i64,
        state: MemberState,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO networks_nodes (network_id, node_id, state) VALUES (?, ?, ?)
            ON CONFLICT (network_id, node_id) DO UPDATE SET state = excluded.state
            "#,
        )
        .bind(network_id)
        .bind(member_id)
        .bind(state.as_i64())
        .execute(&self.pool)
        .await
        .map_err(db_error("set_network_member_state"))?;

        Ok(())
    }

    async fn network_id_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        project: &str,
        name: &str,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT networks.id FROM networks
            JOIN projects ON projects.id = networks.project_id
            WHERE projects.name = ? AND networks.name = ?
            "#,
        )
        .bind(project)
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("network_id"))?
        .ok_or_else(|| NetplaneError::NetworkNotFound {
            project: project.to_string(),
            name: name.to_string(),
        })
    }

    async fn insert_config(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        network_id: i64,
        config: &ConfigMap,
    ) -> Result<()> {
        for (key, value) in config {
            if value.is_empty() {
                continue;
            }

            let node_id = is_member_specific(key).then_some(self.local_member_id);

            sqlx::query(
                "INSERT INTO networks_config (network_id, node_id, key, value) VALUES (?, ?, ?, ?)",
            )
            .bind(network_id)
            .bind(node_id)
            .bind(key)
            .bind(value)
            .execute(&mut **tx)
            .await
            .map_err(db_error("insert_config"))?;
        }

        Ok(())
    }

    // ========================
    // Forwards, ACLs and warnings
    // ========================

    /// Insert a network forward; `member_id` of `None` applies it cluster-wide.
    #[instrument(skip(self, forward))]
    pub async fn create_forward(
        &self,
        network_id: i64,
        member_id: Option<i64>,
        listen_address: &str,
        forward: &NetworkForwardPut,
    ) -> Result<i64> {
        let config = serde_json::to_string(&forward.config).map_err(|e| {
            NetplaneError::DatabaseError(format!("Failed to serialize config: {}", e))
        })?;
        let ports = serde_json::to_string(&forward.ports).map_err(|e| {
            NetplaneError::DatabaseError(format!("Failed to serialize ports: {}", e))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO networks_forwards (network_id, node_id, listen_address, description, config, ports)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(network_id)
        .bind(member_id)
        .bind(listen_address)
        .bind(&forward.description)
        .bind(config)
        .bind(ports)
        .execute(&self.pool)
        .await
        .map_err(db_error("create_forward"))?;

        Ok(result.last_insert_rowid())
    }

    /// Insert an ACL into a project.
    #[instrument(skip(self, acl), fields(acl = %acl.name))]
    pub async fn create_acl(&self, project: &str, acl: &NetworkAcl) -> Result<i64> {
        let project_id = self.project_id(project).await?;

        let ingress = serde_json::to_string(&acl.ingress).map_err(|e| {
            NetplaneError::DatabaseError(format!("Failed to serialize ingress rules: {}", e))
        })?;
        let egress = serde_json::to_string(&acl.egress).map_err(|e| {
            NetplaneError::DatabaseError(format!("Failed to serialize egress rules: {}", e))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO networks_acls (project_id, name, description, ingress, egress)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(project_id)
        .bind(&acl.name)
        .bind(&acl.description)
        .bind(ingress)
        .bind(egress)
        .execute(&self.pool)
        .await
        .map_err(db_error("create_acl"))?;

        Ok(result.last_insert_rowid())
    }

    /// Raise a persistent warning against an entity.
    #[instrument(skip(self, message))]
    pub async fn create_warning(
        &self,
        entity_type: &str,
        entity_id: i64,
        warning_type: &str,
        message: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO warnings (node_id, entity_type, entity_id, type, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(self.local_member_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(warning_type)
        .bind(message)
        .bind(to_unix_secs(SystemTime::now()))
        .execute(&self.pool)
        .await
        .map_err(db_error("create_warning"))?;

        Ok(result.last_insert_rowid())
    }

    /// Count persistent warnings raised against an entity.
    #[instrument(skip(self))]
    pub async fn count_warnings(&self, entity_type: &str, entity_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM warnings WHERE entity_type = ? AND entity_id = ?",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("count_warnings"))
    }
}

#[async_trait]
impl ClusterStore for StateManager {
    fn local_member_id(&self) -> i64 {
        self.local_member_id
    }

    #[instrument(skip(self))]
    async fn cluster_members(&self) -> Result<Vec<ClusterMember>> {
        let rows = sqlx::query("SELECT id, name, address, heartbeat FROM nodes ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("cluster_members"))?;

        Ok(rows
            .into_iter()
            .map(|row| ClusterMember {
                id: row.get("id"),
                name: row.get("name"),
                address: row.get("address"),
                heartbeat: from_unix_secs(row.get("heartbeat")),
            })
            .collect())
    }

    #[instrument(skip(self), fields(project = %project, network = %name))]
    async fn load_network(&self, project: &str, name: &str) -> Result<NetworkRecord> {
        let row = sqlx::query(
            r#"
            SELECT networks.id, networks.type, networks.description, networks.state
            FROM networks
            JOIN projects ON projects.id = networks.project_id
            WHERE projects.name = ? AND networks.name = ?
            "#,
        )
        .bind(project)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("load_network"))?
        .ok_or_else(|| NetplaneError::NetworkNotFound {
            project: project.to_string(),
            name: name.to_string(),
        })?;

        let id: i64 = row.get("id");
        let state: i64 = row.get("state");

        let config_rows = sqlx::query(
            r#"
            SELECT key, value FROM networks_config
            WHERE network_id = ? AND (node_id IS NULL OR node_id = ?)
            "#,
        )
        .bind(id)
        .bind(self.local_member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load_network"))?;

        let config: ConfigMap =
            config_rows.into_iter().map(|r| (r.get("key"), r.get("value"))).collect();

        let member_rows = sqlx::query(
            r#"
            SELECT nodes.id, nodes.name, networks_nodes.state
            FROM networks_nodes
            JOIN nodes ON nodes.id = networks_nodes.node_id
            WHERE networks_nodes.network_id = ?
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load_network"))?;

        let mut members = HashMap::new();
        for r in member_rows {
            let member_state: i64 = r.get("state");
            members.insert(
                r.get::<i64, _>("id"),
                NetworkMember {
                    name: r.get("name"),
                    state: MemberState::from_i64(member_state).unwrap_or_default(),
                },
            );
        }

        Ok(NetworkRecord {
            id,
            project: project.to_string(),
            name: name.to_string(),
            driver: row.get("type"),
            description: row.get("description"),
            config,
            status: MemberState::from_i64(state)
                .map(MemberState::status)
                .unwrap_or(NetworkStatus::Unknown),
            managed: true,
            members,
        })
    }

    #[instrument(skip(self, config), fields(project = %project, network = %name))]
    async fn update_network(
        &self,
        project: &str,
        name: &str,
        description: &str,
        config: &ConfigMap,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error("update_network"))?;

        let network_id = self.network_id_tx(&mut tx, project, name).await?;

        sqlx::query("UPDATE networks SET description = ? WHERE id = ?")
            .bind(description)
            .bind(network_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("update_network"))?;

        // Config of other members is theirs to replace.
        sqlx::query(
            "DELETE FROM networks_config WHERE network_id = ? AND (node_id IS NULL OR node_id = ?)",
        )
        .bind(network_id)
        .bind(self.local_member_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("update_network"))?;

        self.insert_config(&mut tx, network_id, config).await?;

        tx.commit().await.map_err(db_error("update_network"))?;

        debug!(network_id, keys = config.len(), "Updated network record");
        Ok(())
    }

    #[instrument(skip(self), fields(project = %project))]
    async fn rename_network(&self, project: &str, old_name: &str, new_name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error("rename_network"))?;

        let network_id = self.network_id_tx(&mut tx, project, old_name).await?;

        sqlx::query("UPDATE networks SET name = ? WHERE id = ?")
            .bind(new_name)
            .bind(network_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    NetplaneError::NetworkAlreadyExists {
                        project: project.to_string(),
                        name: new_name.to_string(),
                    }
                }
                e => db_error("rename_network")(e),
            })?;

        tx.commit().await.map_err(db_error("rename_network"))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn project_names(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT name FROM projects ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("project_names"))
    }

    #[instrument(skip(self))]
    async fn created_networks(&self, project: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT networks.name FROM networks
            JOIN projects ON projects.id = networks.project_id
            WHERE projects.name = ? AND networks.state = ?
            ORDER BY networks.name
            "#,
        )
        .bind(project)
        .bind(MemberState::Created.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("created_networks"))
    }

    #[instrument(skip(self))]
    async fn forward_listen_addresses(
        &self,
        network_id: i64,
        member_specific: bool,
    ) -> Result<Vec<String>> {
        let query = if member_specific {
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT listen_address FROM networks_forwards
                WHERE network_id = ? AND (node_id IS NULL OR node_id = ?)
                ORDER BY listen_address
                "#,
            )
            .bind(network_id)
            .bind(self.local_member_id)
        } else {
            sqlx::query_scalar::<_, String>(
                "SELECT listen_address FROM networks_forwards WHERE network_id = ? ORDER BY listen_address",
            )
            .bind(network_id)
        };

        query.fetch_all(&self.pool).await.map_err(db_error("forward_listen_addresses"))
    }

    #[instrument(skip(self))]
    async fn delete_warnings(&self, entity_type: &str, entity_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM warnings WHERE entity_type = ? AND entity_id = ?")
            .bind(entity_type)
            .bind(entity_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_warnings"))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn cluster_config(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM config")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("cluster_config"))?;

        Ok(rows.into_iter().map(|r| (r.get("key"), r.get("value"))).collect())
    }

    #[instrument(skip(self, values))]
    async fn update_cluster_config(&self, values: &HashMap<String, String>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error("update_cluster_config"))?;

        for (key, value) in values {
            if value.is_empty() {
                sqlx::query("DELETE FROM config WHERE key = ?")
                    .bind(key)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error("update_cluster_config"))?;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO config (key, value) VALUES (?, ?)
                    ON CONFLICT (key) DO UPDATE SET value = excluded.value
                    "#,
                )
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(db_error("update_cluster_config"))?;
            }
        }

        tx.commit().await.map_err(db_error("update_cluster_config"))?;

        Ok(())
    }
}

#[async_trait]
impl AclStore for StateManager {
    #[instrument(skip(self))]
    async fn network_acl_names(&self, project: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT networks_acls.name FROM networks_acls
            JOIN projects ON projects.id = networks_acls.project_id
            WHERE projects.name = ?
            ORDER BY networks_acls.name
            "#,
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("network_acl_names"))
    }

    #[instrument(skip(self))]
    async fn network_acl(&self, project: &str, name: &str) -> Result<NetworkAcl> {
        let row = sqlx::query(
            r#"
            SELECT networks_acls.description, networks_acls.ingress, networks_acls.egress
            FROM networks_acls
            JOIN projects ON projects.id = networks_acls.project_id
            WHERE projects.name = ? AND networks_acls.name = ?
            "#,
        )
        .bind(project)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("network_acl"))?
        .ok_or_else(|| NetplaneError::NotFound { kind: "Network ACL", name: name.to_string() })?;

        let ingress_json: String = row.get("ingress");
        let egress_json: String = row.get("egress");

        Ok(NetworkAcl {
            name: name.to_string(),
            description: row.get("description"),
            ingress: serde_json::from_str(&ingress_json).map_err(|e| {
                NetplaneError::DatabaseError(format!("Failed to parse ingress rules: {}", e))
            })?,
            egress: serde_json::from_str(&egress_json).map_err(|e| {
                NetplaneError::DatabaseError(format!("Failed to parse egress rules: {}", e))
            })?,
        })
    }
}
