// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Storage configuration.

use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PRIMARY_FILE: &str = "records.json";
pub const DEFAULT_TREE_FILE: &str = "records.xml";

/// Suffix of the staging file written before each rename.
pub const STAGING_SUFFIX: &str = "tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub primary_file: String,
    pub tree_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            primary_file: DEFAULT_PRIMARY_FILE.to_string(),
            tree_file: DEFAULT_TREE_FILE.to_string(),
        }
    }
}

impl StoreConfig {
    /// Default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn primary_path(&self) -> PathBuf {
        self.data_dir.join(&self.primary_file)
    }

    pub fn tree_path(&self) -> PathBuf {
        self.data_dir.join(&self.tree_file)
    }
}

/// `records.json` -> `records.json.tmp`
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}
