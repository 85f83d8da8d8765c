// Persistence for the announcements seen so far: one pretty-printed JSON
// file plus optional dated backups next to it.

use crate::config::StorageConfig;
use crate::error::StoreError;
use crate::model::Snapshot;
use std::fs;
use std::path::{Path, PathBuf};

const BACKUP_DIR: &str = "backups";

pub struct Store {
    path: PathBuf,
    backup_enabled: bool,
    backup_count: usize,
}

impl Store {
    pub fn new(storage: &StorageConfig) -> Self {
        Store {
            path: storage.data_file.clone(),
            backup_enabled: storage.backup_enabled,
            backup_count: storage.backup_count,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored snapshot. A missing file is an empty snapshot; an
    /// unreadable one is logged and also treated as empty.
    pub fn load(&self) -> Snapshot {
        if !self.path.exists() {
            return Snapshot::default();
        }
        let parsed = fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("failed to load {}: {e}", self.path.display());
                Snapshot::default()
            }
        }
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        if self.backup_enabled && self.path.exists() {
            // Backup failures never block the save.
            if let Err(e) = self.backup() {
                log::warn!("backup of {} failed: {e}", self.path.display());
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        log::info!("data saved to {}", self.path.display());
        Ok(())
    }

    fn backup_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.join(BACKUP_DIR),
            _ => PathBuf::from(BACKUP_DIR),
        }
    }

    /// Copy the current file to `backups/<stem>-YYYYMMDD.json` (one per day)
    /// and prune to the newest `backup_count`.
    fn backup(&self) -> std::io::Result<()> {
        let dir = self.backup_dir();
        fs::create_dir_all(&dir)?;
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("announcements");
        let name = format!("{stem}-{}.json", chrono::Local::now().format("%Y%m%d"));
        fs::copy(&self.path, dir.join(name))?;
        prune_backups(&dir, stem, self.backup_count)
    }
}

fn prune_backups(dir: &Path, stem: &str, keep: usize) -> std::io::Result<()> {
    let prefix = format!("{stem}-");
    let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".json"))
        })
        .collect();
    // Date-stamped names sort chronologically.
    backups.sort();
    let excess = backups.len().saturating_sub(keep);
    for old in &backups[..excess] {
        fs::remove_file(old)?;
    }
    Ok(())
}
