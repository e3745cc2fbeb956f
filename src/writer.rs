// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Dual-format writer.
//!
//! Both encodings are always rewritten in full from one collection:
//! - primary: `records.json`, a pretty-printed JSON array
//! - tree: `records.xml`, `<records>` wrapping one `<record>` per entry
//!
//! Each file is staged as `<name>.tmp`, fsynced, then renamed into place.
//! The tree is renamed first and the primary last, so the primary rename is
//! the commit point and a leftover primary staging file marks an interrupted
//! commit.

use crate::config::{staging_path, StoreConfig};
use crate::error::{StoreError, WriteError};
use crate::record::Record;
use serde::{Serialize, Serializer};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
const TREE_ROOT: &str = "records";

#[derive(Serialize)]
struct TreeDocument<'a, S: ?Sized> {
    record: &'a S,
}

/// One pending change on top of the committed collection.
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    Append(&'a Record),
    Replace(usize, &'a Record),
    Remove(usize),
}

/// The collection as it will look once `change` is committed, without
/// touching or copying the committed `base`.
#[derive(Debug, Clone, Copy)]
pub struct Staged<'a> {
    base: &'a [Record],
    change: Change<'a>,
}

impl<'a> Staged<'a> {
    pub fn new(base: &'a [Record], change: Change<'a>) -> Self {
        Self { base, change }
    }

    pub fn base(&self) -> &'a [Record] {
        self.base
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + 'a {
        let change = self.change;
        let appended = match change {
            Change::Append(rec) => Some(rec),
            _ => None,
        };
        self.base
            .iter()
            .enumerate()
            .filter_map(move |(i, rec)| match change {
                Change::Replace(pos, new) if pos == i => Some(new),
                Change::Remove(pos) if pos == i => None,
                _ => Some(rec),
            })
            .chain(appended)
    }
}

impl Serialize for Staged<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

pub fn encode_primary<S: Serialize + ?Sized>(records: &S) -> Result<Vec<u8>, WriteError> {
    Ok(serde_json::to_vec_pretty(records)?)
}

pub fn encode_tree<S: Serialize + ?Sized>(records: &S) -> Result<String, WriteError> {
    let mut xml = String::from(XML_DECLARATION);
    let mut ser = quick_xml::se::Serializer::with_root(&mut xml, Some(TREE_ROOT))
        .map_err(|e| WriteError::Xml(e.to_string()))?;
    ser.indent(' ', 2);
    TreeDocument { record: records }
        .serialize(ser)
        .map_err(|e| WriteError::Xml(e.to_string()))?;
    Ok(xml)
}

#[derive(Debug, Clone)]
pub struct DualFormatWriter {
    dir: PathBuf,
    primary: PathBuf,
    tree: PathBuf,
}

impl DualFormatWriter {
    pub fn new(cfg: &StoreConfig) -> Self {
        Self {
            dir: cfg.data_dir.clone(),
            primary: cfg.primary_path(),
            tree: cfg.tree_path(),
        }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    pub fn tree_path(&self) -> &Path {
        &self.tree
    }

    /// Persist `records` to both encodings.
    pub async fn write(&self, records: &[Record]) -> Result<(), WriteError> {
        self.write_encoded(records, None).await
    }

    /// Persist the staged collection. On `Err` neither encoding shows the
    /// change: if the tree was already replaced it is re-mirrored from the
    /// base collection.
    pub async fn commit(&self, staged: &Staged<'_>) -> Result<(), WriteError> {
        self.write_encoded(staged, Some(staged.base())).await
    }

    async fn write_encoded<S: Serialize + ?Sized>(
        &self,
        next: &S,
        previous: Option<&[Record]>,
    ) -> Result<(), WriteError> {
        let primary = encode_primary(next)?;
        let tree = encode_tree(next)?;

        let primary_tmp = staging_path(&self.primary);
        let tree_tmp = staging_path(&self.tree);

        let staged = async {
            write_synced(&tree_tmp, tree.as_bytes()).await?;
            write_synced(&primary_tmp, &primary).await?;
            fs::rename(&tree_tmp, &self.tree).await
        };
        if let Err(e) = staged.await {
            let _ = fs::remove_file(&tree_tmp).await;
            let _ = fs::remove_file(&primary_tmp).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&primary_tmp, &self.primary).await {
            // Tree is ahead of the primary. Put it back; if that fails too,
            // the staging file stays so the next open re-mirrors.
            if let Some(previous) = previous {
                if self.mirror_tree(previous).await.is_ok() {
                    let _ = fs::remove_file(&primary_tmp).await;
                }
            }
            return Err(e.into());
        }

        // Committed. A failed directory fsync cannot undo the renames, so it
        // does not fail the write.
        let _ = sync_dir(&self.dir).await;
        Ok(())
    }

    /// Rewrite only the tree encoding.
    pub async fn mirror_tree(&self, records: &[Record]) -> Result<(), WriteError> {
        let tree = encode_tree(records)?;
        let tree_tmp = staging_path(&self.tree);
        if let Err(e) = write_synced(&tree_tmp, tree.as_bytes()).await {
            let _ = fs::remove_file(&tree_tmp).await;
            return Err(e.into());
        }
        fs::rename(&tree_tmp, &self.tree).await?;
        sync_dir(&self.dir).await?;
        Ok(())
    }

    /// Create the data directory and an empty primary encoding if missing.
    /// Returns true if the primary file was created.
    pub async fn prepare(&self) -> Result<bool, WriteError> {
        fs::create_dir_all(&self.dir).await?;
        if fs::try_exists(&self.primary).await? {
            return Ok(false);
        }
        let empty = encode_primary::<[Record]>(&[])?;
        let primary_tmp = staging_path(&self.primary);
        write_synced(&primary_tmp, &empty).await?;
        fs::rename(&primary_tmp, &self.primary).await?;
        sync_dir(&self.dir).await?;
        Ok(true)
    }

    pub async fn tree_exists(&self) -> io::Result<bool> {
        fs::try_exists(&self.tree).await
    }

    /// Remove staging files left behind by an interrupted write.
    /// Returns true if a primary staging file was found.
    pub async fn discard_staging(&self) -> io::Result<bool> {
        let interrupted = remove_if_exists(&staging_path(&self.primary)).await?;
        remove_if_exists(&staging_path(&self.tree)).await?;
        Ok(interrupted)
    }

    /// Read the primary encoding. The tree encoding is never read back.
    pub async fn load(&self) -> Result<Vec<Record>, StoreError> {
        let bytes = fs::read(&self.primary).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::InvalidFormat(format!("{}: {}", self.primary.display(), e))
        })
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
static FAILING_DIR_SYNCS: std::sync::Mutex<Vec<PathBuf>> = std::sync::Mutex::new(Vec::new());

async fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(test)]
    {
        let failing = FAILING_DIR_SYNCS
            .lock()
            .map(|dirs| dirs.iter().any(|d| d == dir))
            .unwrap_or(false);
        if failing {
            return Err(io::Error::new(io::ErrorKind::Other, "directory sync disabled"));
        }
    }
    sync_dir_inner(dir).await
}

#[cfg(unix)]
async fn sync_dir_inner(dir: &Path) -> io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir_inner(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
pub(crate) fn decode_tree(xml: &str) -> Vec<Record> {
    #[derive(serde::Deserialize)]
    struct Tree {
        #[serde(default)]
        record: Vec<Record>,
    }
    quick_xml::de::from_str::<Tree>(xml).unwrap().record
}
