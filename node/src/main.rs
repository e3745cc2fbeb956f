// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::Context;
use registry_core::RecordStore;
use registry_node::config::NodeConfig;
use registry_node::server::{build_router, SharedStore};
use registry_node::telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    telemetry::init_metrics().context("failed to install Prometheus recorder")?;

    let cfg = NodeConfig::from_env()?;
    tracing::info!("Initializing registry node with config: {:?}", cfg);

    let store = RecordStore::open(cfg.store_config())
        .await
        .with_context(|| format!("failed to open record store in {:?}", cfg.data_dir))?;

    let report = store.recovery();
    if report.created {
        tracing::info!("Created empty collection at {:?}", store.writer().primary_path());
    }
    if report.interrupted {
        tracing::warn!("Discarded staging files from an interrupted write");
    }
    if report.tree_rebuilt {
        tracing::info!("Rebuilt {:?} from the primary encoding", store.writer().tree_path());
    }
    tracing::info!("Loaded {} records", report.records_loaded);
    metrics::gauge!("registry_records", report.records_loaded as f64);

    let shared: SharedStore = Arc::new(store);
    let app = build_router(shared, &cfg);

    let addr = cfg.bind_addr;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
