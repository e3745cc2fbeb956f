// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Startup recovery.
//!
//! The primary encoding is authoritative. If a commit was interrupted (a
//! primary staging file survived) or the tree encoding is missing, the tree
//! is re-mirrored from whatever the primary holds.

use crate::error::{Result, StoreError, WriteError};
use crate::record::{check_text, Record};
use crate::writer::DualFormatWriter;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Primary encoding did not exist and was created empty.
    pub created: bool,
    /// Staging files from an interrupted commit were discarded.
    pub interrupted: bool,
    /// The tree encoding was rewritten from the primary.
    pub tree_rebuilt: bool,
    pub records_loaded: usize,
}

pub async fn recover(writer: &DualFormatWriter) -> Result<(Vec<Record>, RecoveryReport)> {
    let created = writer.prepare().await.map_err(open_error)?;
    let interrupted = writer.discard_staging().await?;

    let records = writer.load().await?;
    check_collection(&records)?;

    let tree_rebuilt = interrupted || !writer.tree_exists().await?;
    if tree_rebuilt {
        writer
            .mirror_tree(&records)
            .await
            .map_err(open_error)?;
    }

    let report = RecoveryReport {
        created,
        interrupted,
        tree_rebuilt,
        records_loaded: records.len(),
    };
    Ok((records, report))
}

// Nothing is being mutated during open, so a write failure here is a plain
// storage error.
fn open_error(e: WriteError) -> StoreError {
    match e {
        WriteError::Io(e) => StoreError::Io(e),
        other => StoreError::InvalidFormat(other.to_string()),
    }
}

/// Every id non-empty and unique, and every field representable in the tree
/// encoding.
pub fn check_collection(records: &[Record]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for (pos, rec) in records.iter().enumerate() {
        if rec.id.is_empty() {
            return Err(StoreError::InvalidFormat(format!(
                "record at position {} has an empty id",
                pos
            )));
        }
        if !seen.insert(rec.id.as_str()) {
            return Err(StoreError::InvalidFormat(format!("duplicate id {}", rec.id)));
        }
        for (field, value) in rec.text_fields() {
            check_text(field, value).map_err(|e| {
                StoreError::InvalidFormat(format!("record {}: {}", rec.id, e))
            })?;
        }
    }
    Ok(())
}
