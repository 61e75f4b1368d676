//! Durable snapshot storage.
//!
//! Both regimen tables are kept under two fixed keys, each value a JSON
//! column snapshot. Writes overwrite unconditionally; there is no history.

use crate::snapshot::{RegimenSnapshot, TableSnapshot};
use crate::{Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Key of the multidose table
pub const MULTIDOSE_KEY: &str = "multiDoseTable";
/// Key of the steady-state table
pub const STEADY_STATE_KEY: &str = "steadyStateTable";

/// Key/value storage for snapshots
pub trait SnapshotStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// File-backed store: key `k` lives in `<dir>/k.json`
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SnapshotStore for FileStore {
    /// Read a value with a shared lock; a missing file is `None`.
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        tracing::debug!("Read {} from {:?}", key, path);
        Ok(Some(contents))
    }

    /// Atomically replace a value:
    /// 1. Write to a temp file in the same directory
    /// 2. Sync to disk
    /// 3. Rename over the original
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        let temp = NamedTempFile::new_in(&self.dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Wrote {} to {:?}", key, path);
        Ok(())
    }
}

/// In-memory store, used by tests and embedders without a filesystem
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Write both tables of a snapshot, overwriting previous values.
pub fn serialize_local(store: &mut dyn SnapshotStore, snapshot: &RegimenSnapshot) -> Result<()> {
    if let Some(table) = &snapshot.multidose {
        store.set(MULTIDOSE_KEY, &table.to_json()?)?;
    }
    if let Some(table) = &snapshot.steady_state {
        store.set(STEADY_STATE_KEY, &table.to_json()?)?;
    }
    tracing::info!("Saved regimen snapshot");
    Ok(())
}

/// Read both tables back. Unreadable or malformed values count as absent;
/// `None` when neither table is present.
pub fn restore_local(store: &dyn SnapshotStore) -> Option<RegimenSnapshot> {
    let snapshot = RegimenSnapshot {
        multidose: read_table(store, MULTIDOSE_KEY),
        steady_state: read_table(store, STEADY_STATE_KEY),
    };

    if snapshot.is_empty() {
        tracing::debug!("No stored regimen found");
        None
    } else {
        Some(snapshot)
    }
}

fn read_table(store: &dyn SnapshotStore, key: &str) -> Option<TableSnapshot> {
    match store.get(key) {
        Ok(Some(value)) => TableSnapshot::from_json(&value),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Unable to read stored {}: {}. Ignoring it.", key, e);
            None
        }
    }
}
