//! Member configuration.
//!
//! Settings local to one member, as opposed to [`crate::cluster::ClusterConfig`]
//! which is shared by the whole cluster.

use crate::cluster::NotifyPolicy;
use crate::error::{NetplaneError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Persistent configuration of a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: String,
    pub log_level: String,

    /// Name of this member in the cluster
    pub member_name: String,

    /// Address of the Prometheus listener, disabled when unset
    pub metrics_listen: Option<SocketAddr>,

    /// How network changes treat offline members
    pub notify_policy: NotifyPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: paths::data_dir().to_string_lossy().to_string(),
            log_level: "info".to_string(),
            member_name: "none".to_string(),
            metrics_listen: None,
            notify_policy: NotifyPolicy::default(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path`, defaults if the file is missing.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| NetplaneError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| NetplaneError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| NetplaneError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| NetplaneError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content)
            .map_err(|e| NetplaneError::IoError { path: path.to_path_buf(), source: e })
    }
}
