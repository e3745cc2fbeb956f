// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Record store.
//!
//! Owns the collection. A mutation takes the write guard, commits the changed
//! collection to disk and only then applies the change in memory, so memory
//! always matches the last committed on-disk state. The commit runs in its own
//! task holding an owned guard: dropping the caller's future does not stop a
//! commit halfway. Tokio's `RwLock` is fair, which queues concurrent
//! mutations in arrival order.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError, WriteError};
use crate::id::new_id;
use crate::record::{NewRecord, Record, RecordPatch};
use crate::recovery::{recover, RecoveryReport};
use crate::writer::{Change, DualFormatWriter, Staged};
use std::io;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub struct RecordStore {
    records: Arc<RwLock<Vec<Record>>>,
    writer: Arc<DualFormatWriter>,
    recovery: RecoveryReport,
}

impl RecordStore {
    /// Prepare storage, recover from an interrupted commit if needed and load
    /// the primary encoding.
    pub async fn open(cfg: StoreConfig) -> Result<Self> {
        let writer = DualFormatWriter::new(&cfg);
        let (records, recovery) = recover(&writer).await?;
        Ok(Self {
            records: Arc::new(RwLock::new(records)),
            writer: Arc::new(writer),
            recovery,
        })
    }

    /// What `open` found and repaired.
    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub fn writer(&self) -> &DualFormatWriter {
        &self.writer
    }

    /// Full collection in insertion order.
    pub async fn list(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn create(&self, fields: NewRecord) -> Result<Record> {
        fields.validate()?;
        let mut records = self.records.clone().write_owned().await;
        let writer = self.writer.clone();

        let task = tokio::spawn(async move {
            let mut id = new_id();
            while records.iter().any(|r| r.id == id) {
                id = new_id();
            }
            let record = Record::from_new(id, fields);

            writer
                .commit(&Staged::new(&records, Change::Append(&record)))
                .await
                .map_err(StoreError::Persistence)?;
            records.push(record.clone());
            Ok(record)
        });
        join_commit(task).await
    }

    pub async fn update(&self, id: &str, patch: RecordPatch) -> Result<Record> {
        patch.validate()?;
        let mut records = self.records.clone().write_owned().await;

        let pos = records
            .iter()
            .position(|r| r.id == *id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut updated = records[pos].clone();
        updated.apply(patch);
        let writer = self.writer.clone();

        let task = tokio::spawn(async move {
            writer
                .commit(&Staged::new(&records, Change::Replace(pos, &updated)))
                .await
                .map_err(StoreError::Persistence)?;
            records[pos] = updated.clone();
            Ok(updated)
        });
        join_commit(task).await
    }

    /// Remove the record if present. Deleting an unknown id is a no-op and
    /// does not touch storage.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.clone().write_owned().await;

        let Some(pos) = records.iter().position(|r| r.id == *id) else {
            return Ok(());
        };
        let writer = self.writer.clone();

        let task = tokio::spawn(async move {
            writer
                .commit(&Staged::new(&records, Change::Remove(pos)))
                .await
                .map_err(StoreError::Persistence)?;
            records.remove(pos);
            Ok(())
        });
        join_commit(task).await
    }
}

/// Wait for a spawned commit. The task keeps running if this future is
/// dropped.
async fn join_commit<T>(task: JoinHandle<Result<T>>) -> Result<T> {
    match task.await {
        Ok(res) => res,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        // runtime shutting down
        Err(_) => Err(StoreError::Persistence(WriteError::Io(io::Error::new(
            io::ErrorKind::Interrupted,
            "commit task cancelled",
        )))),
    }
}
