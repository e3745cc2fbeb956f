// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use std::io;
use thiserror::Error;

/// Failure while encoding or writing the two on-disk encodings.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML encoding failed: {0}")]
    Xml(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The referenced record id does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),
    /// A text field holds a character the tree encoding cannot represent.
    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    /// Reading, preparing or repairing storage failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The primary encoding could not be parsed or breaks the id invariants.
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
    /// A mutation could not be persisted. The in-memory collection was not
    /// changed.
    #[error("Persistence failed: {0}")]
    Persistence(#[source] WriteError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
