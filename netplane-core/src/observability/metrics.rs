//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - no suffix for gauges of current state

use metrics::{describe_counter, describe_gauge};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // Network lifecycle metrics
    describe_counter!(
        "netplane_network_updates_total",
        "Total number of network updates applied (by origin: direct, notification)"
    );
    describe_counter!(
        "netplane_dependency_notifications_failed_total",
        "Total number of dependent networks that failed to handle a change"
    );

    // Cluster metrics
    describe_counter!(
        "netplane_notifications_sent_total",
        "Total number of network updates relayed to other members"
    );
    describe_counter!(
        "netplane_notifications_failed_total",
        "Total number of network updates a member failed to receive"
    );

    // BGP metrics
    describe_counter!("netplane_bgp_peers_added_total", "Total number of BGP peers added");
    describe_counter!("netplane_bgp_peers_removed_total", "Total number of BGP peers removed");
    describe_counter!(
        "netplane_bgp_prefixes_added_total",
        "Total number of prefixes exported (by owner: network, forward)"
    );
    describe_counter!(
        "netplane_bgp_prefixes_withdrawn_total",
        "Total number of prefixes withdrawn"
    );
    describe_gauge!("netplane_bgp_peers", "Current number of BGP peers");
    describe_gauge!("netplane_bgp_prefixes", "Current number of exported prefixes");

    // Database metrics
    describe_counter!(
        "netplane_db_errors_total",
        "Total number of database query failures (by operation)"
    );
}
