// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque record identity. Serializes as a bare string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl PartialEq<str> for RecordId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Mint a fresh identity. Random (UUID v4), needs no shared state.
pub fn new_id() -> RecordId {
    RecordId(Uuid::new_v4().to_string())
}
