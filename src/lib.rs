// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! registry-core: the persistence core of the personal record registry.
//!
//! One in-memory collection of [`Record`]s is the source of truth. Every
//! mutation re-derives both on-disk encodings (JSON primary, XML tree) from it
//! before the call returns.

pub mod config;
pub mod error;
pub mod id;
pub mod record;
pub mod recovery;
pub mod store;
pub mod writer;

pub use config::StoreConfig;
pub use error::{Result, StoreError, WriteError};
pub use id::{new_id, RecordId};
pub use record::{NewRecord, Record, RecordPatch};
pub use store::RecordStore;
pub use writer::DualFormatWriter;
