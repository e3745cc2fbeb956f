// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::api::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use registry_core::StoreError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Operation::Create => "Error creating record",
            Operation::Update => "Error updating record",
            Operation::Delete => "Error deleting record",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A store failure tagged with the operation that hit it.
#[derive(Error, Debug)]
#[error("{op} failed: {source}")]
pub struct ApiError {
    pub op: Operation,
    #[source]
    pub source: StoreError,
}

impl ApiError {
    pub fn new(op: Operation, source: StoreError) -> Self {
        Self { op, source }
    }

    pub fn status(&self) -> StatusCode {
        match self.source {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.source {
            StoreError::NotFound(_) => {
                tracing::debug!(op = %self.op, "{}", self.source);
                "Record not found".to_string()
            }
            StoreError::InvalidField { .. } => {
                tracing::debug!(op = %self.op, "{}", self.source);
                self.source.to_string()
            }
            _ => {
                tracing::error!(op = %self.op, error = %self.source, "mutation failed");
                metrics::increment_counter!("registry_mutation_failures_total", "op" => self.op.as_str());
                self.op.failure_message().to_string()
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
