// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use registry_core::{NewRecord, Record, RecordPatch, RecordStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::NodeConfig;
use crate::errors::{ApiError, Operation};

/// The store is the only shared state; handlers never see the files.
pub type SharedStore = Arc<RecordStore>;

pub fn build_router(state: SharedStore, cfg: &NodeConfig) -> Router {
    let mut app = Router::new()
        .route("/records", get(list_records).post(create_record))
        .route("/records/:id", put(update_record).delete(delete_record))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    if let Some(dir) = &cfg.static_dir {
        tracing::info!("Serving static files from {:?}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(cfg.body_limit_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn list_records(State(store): State<SharedStore>) -> Json<Vec<Record>> {
    Json(store.list().await)
}

async fn create_record(
    State(store): State<SharedStore>,
    Json(fields): Json<NewRecord>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let record = store
        .create(fields)
        .await
        .map_err(|e| ApiError::new(Operation::Create, e))?;

    committed(&store, Operation::Create).await;
    tracing::info!(id = %record.id, "record created");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    Json(patch): Json<RecordPatch>,
) -> Result<Json<Record>, ApiError> {
    let record = store
        .update(&id, patch)
        .await
        .map_err(|e| ApiError::new(Operation::Update, e))?;

    committed(&store, Operation::Update).await;
    tracing::info!(id = %record.id, "record updated");
    Ok(Json(record))
}

async fn delete_record(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    store
        .delete(&id)
        .await
        .map_err(|e| ApiError::new(Operation::Delete, e))?;

    committed(&store, Operation::Delete).await;
    tracing::info!(id = %id, "record deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}

async fn committed(store: &RecordStore, op: Operation) {
    metrics::increment_counter!("registry_mutations_total", "op" => op.as_str());
    metrics::gauge!("registry_records", store.len().await as f64);
}
