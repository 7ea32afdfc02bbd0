//! Byte-exact registry snapshots, one per healing batch.

use crate::error::{IdsError, Result};
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub batch_id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    max_backups: usize,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            dir: dir.into(),
            max_backups,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn create(&self, batch_id: &str, bytes: &[u8]) -> Result<PathBuf> {
        paths::validate_batch_id(batch_id)?;
        io::ensure_dir(&self.dir)?;
        let path = paths::backup_file(&self.dir, batch_id);
        io::atomic_write(&path, bytes)?;
        Ok(path)
    }

    /// Path of an existing backup; `BackupNotFound` otherwise.
    pub fn locate(&self, batch_id: &str) -> Result<PathBuf> {
        paths::validate_batch_id(batch_id)?;
        let path = paths::backup_file(&self.dir, batch_id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(IdsError::BackupNotFound(batch_id.to_string()))
        }
    }

    pub fn read(&self, batch_id: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.locate(batch_id)?)?)
    }

    /// Backups newest first. Batch ids lead with a UTC timestamp, so name
    /// order is creation order.
    pub fn list(&self) -> Result<Vec<BackupInfo>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(batch_id) = name.to_str().and_then(paths::batch_id_from_backup) else {
                continue;
            };
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            backups.push(BackupInfo {
                batch_id: batch_id.to_string(),
                path: entry.path(),
                size_bytes: meta.len(),
            });
        }
        backups.sort_by(|a, b| b.batch_id.cmp(&a.batch_id));
        Ok(backups)
    }

    /// Evict the oldest backups beyond the retention cap. Returns how many
    /// were removed.
    pub fn prune(&self) -> Result<usize> {
        let backups = self.list()?;
        let mut removed = 0;
        for old in backups.iter().skip(self.max_backups) {
            std::fs::remove_file(&old.path)?;
            tracing::debug!(batch = %old.batch_id, "pruned registry backup");
            removed += 1;
        }
        Ok(removed)
    }
}
