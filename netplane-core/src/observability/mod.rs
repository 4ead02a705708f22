//! Observability infrastructure: tracing and metrics.
//!
//! Every component logs through `tracing` and records through `metrics`;
//! this module installs the subscriber and the Prometheus exporter once at
//! member startup.

use crate::config::Config;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Build the log filter: `RUST_LOG` wins over the configured level.
fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global observability infrastructure.
///
/// This must be called once at member startup before any other operations.
pub fn init(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .try_init()?;

    if let Some(listen) = config.metrics_listen {
        PrometheusBuilder::new().with_http_listener(listen).install()?;
        tracing::info!(%listen, "Prometheus exporter listening");
    }

    metrics::register_core_metrics();

    tracing::info!(member = %config.member_name, "Observability initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_falls_back_on_bad_level() {
        // An unparseable level must not prevent startup.
        let filter = env_filter("netplane_core=[");
        assert!(!filter.to_string().is_empty());
    }
}
