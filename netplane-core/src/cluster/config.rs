//! Cluster-wide configuration stored in the cluster database.

use crate::error::{NetplaneError, Result};
use crate::state::ClusterStore;
use crate::validate::{self, ValidateResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// Interval at which members exchange heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

const DEFAULT_OFFLINE_THRESHOLD: u64 = 20;

struct Key {
    name: &'static str,
    default: &'static str,
    validator: fn(&str) -> ValidateResult,
}

fn validate_offline_threshold(value: &str) -> ValidateResult {
    let secs =
        value.parse::<u64>().map_err(|_| format!("Invalid value for an integer {:?}", value))?;
    if secs <= HEARTBEAT_INTERVAL.as_secs() {
        return Err(format!("Value must be greater than '{}'", HEARTBEAT_INTERVAL.as_secs()));
    }
    Ok(())
}

fn validate_asn(value: &str) -> ValidateResult {
    if value.is_empty() {
        return Ok(());
    }
    validate::is_in_range(0, 4_294_967_294)(value)
}

const KEYS: &[Key] = &[
    Key { name: "cluster.offline_threshold", default: "20", validator: validate_offline_threshold },
    Key { name: "core.bgp_asn", default: "", validator: validate_asn },
    Key { name: "core.proxy_http", default: "", validator: validate::is_any },
    Key { name: "core.proxy_https", default: "", validator: validate::is_any },
    Key { name: "core.proxy_ignore_hosts", default: "", validator: validate::is_any },
];

fn lookup(name: &str) -> Option<&'static Key> {
    KEYS.iter().find(|k| k.name == name)
}

/// Cluster-wide configuration.
pub struct ClusterConfig {
    store: Arc<dyn ClusterStore>,
    values: HashMap<String, String>,
}

impl ClusterConfig {
    /// Load the configuration, ignoring unknown or invalid keys.
    #[instrument(skip(store))]
    pub async fn load(store: Arc<dyn ClusterStore>) -> Result<Self> {
        let mut values = HashMap::new();

        for (name, value) in store.cluster_config().await? {
            let Some(key) = lookup(&name) else {
                warn!(key = %name, "Ignoring unknown cluster config key");
                continue;
            };

            if let Err(reason) = (key.validator)(&value) {
                warn!(key = %name, %reason, "Ignoring invalid cluster config value");
                continue;
            }

            values.insert(name, value);
        }

        Ok(Self { store, values })
    }

    /// Explicitly set values, defaults are not included.
    pub fn dump(&self) -> HashMap<String, String> {
        self.values.clone()
    }

    /// Update the given keys, keeping the others. An empty value resets a key.
    ///
    /// Returns the keys whose value changed.
    #[instrument(skip(self, patch))]
    pub async fn patch(&mut self, patch: HashMap<String, String>) -> Result<HashMap<String, String>> {
        let mut values = self.values.clone();
        values.extend(patch);
        self.apply(values).await
    }

    /// Replace the whole configuration; keys not given are reset.
    ///
    /// Returns the keys whose value changed.
    #[instrument(skip(self, values))]
    pub async fn replace(
        &mut self,
        values: HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        self.apply(values).await
    }

    async fn apply(&mut self, values: HashMap<String, String>) -> Result<HashMap<String, String>> {
        for (name, value) in &values {
            let key = lookup(name).ok_or_else(|| NetplaneError::InvalidConfig {
                reason: format!("unknown key '{}'", name),
            })?;

            if value.is_empty() {
                continue;
            }

            (key.validator)(value).map_err(|reason| NetplaneError::InvalidConfig {
                reason: format!("cannot set '{}' to '{}': {}", name, value, reason),
            })?;
        }

        let mut changed = HashMap::new();
        for key in KEYS {
            let old = self.values.get(key.name).map(String::as_str).unwrap_or("");
            let new = values.get(key.name).map(String::as_str).unwrap_or("");
            if old != new {
                changed.insert(key.name.to_string(), new.to_string());
            }
        }

        if !changed.is_empty() {
            self.store.update_cluster_config(&changed).await?;
        }

        self.values = values.into_iter().filter(|(_, v)| !v.is_empty()).collect();

        Ok(changed)
    }

    fn get(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(value) => value,
            None => lookup(name).map(|k| k.default).unwrap_or(""),
        }
    }

    /// How long a member may miss heartbeats before it is considered offline.
    pub fn offline_threshold(&self) -> Duration {
        let secs = self.get("cluster.offline_threshold").parse().unwrap_or(DEFAULT_OFFLINE_THRESHOLD);
        Duration::from_secs(secs)
    }

    /// Local ASN of the BGP speaker, 0 when BGP is disabled.
    pub fn bgp_asn(&self) -> u32 {
        self.get("core.bgp_asn").parse().unwrap_or(0)
    }

    pub fn proxy_http(&self) -> &str {
        self.get("core.proxy_http")
    }

    pub fn proxy_https(&self) -> &str {
        self.get("core.proxy_https")
    }

    pub fn proxy_ignore_hosts(&self) -> &str {
        self.get("core.proxy_ignore_hosts")
    }
}
