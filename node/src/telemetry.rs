// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Logs to stdout, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "registry_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Install the Prometheus recorder and describe the registry metrics.
pub fn init_metrics() -> Result<(), BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    if PROM_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
    }

    metrics::describe_counter!("registry_mutations_total", "Mutations committed to both encodings");
    metrics::describe_counter!("registry_mutation_failures_total", "Mutations rejected because storage failed");
    metrics::describe_gauge!("registry_records", "Records in the collection");

    metrics::gauge!("registry_node_up", 1.0);
    Ok(())
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
