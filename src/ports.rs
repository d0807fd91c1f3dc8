//! Side-effect ports
//!
//! The workshop never talks to a terminal or filesystem directly. Confirmation
//! gates, notices, backup files and the persisted flag store are injected.

use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::snapshot::Snapshot;

/// Flag recording that the first-run notice was dismissed.
pub const WELCOME_SEEN_FLAG: &str = "fabric-app-welcome-seen";

pub const WELCOME_NOTICE: &str = "Welcome to FabricWorks. All data lives in this session only and is \
lost when it ends. Export a backup regularly and restore it to continue later.";

#[derive(Debug, Error)]
pub enum PortError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PortError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PortError::Io { path: path.to_path_buf(), source }
    }
}

/// User interaction gate.
pub trait Prompt {
    /// Blocking yes/no. Callers must not proceed on `false`.
    fn confirm(&mut self, message: &str) -> bool;

    fn notify(&mut self, message: &str);

    /// Offered when the record count reaches a backup milestone.
    fn offer_backup(&mut self, total_records: usize) -> bool {
        self.confirm(&format!(
            "You now have {total_records} records. Data is lost when the session ends. Back up now?"
        ))
    }
}

/// Destination for full snapshots.
pub trait BackupSink {
    fn store(&mut self, snapshot: &Snapshot) -> Result<PathBuf, PortError>;
}

/// Process-external key/value flags.
pub trait FlagStore {
    fn is_set(&self, key: &str) -> bool;
    fn set(&mut self, key: &str) -> Result<(), PortError>;
}

/// Writes `fabric_backup_<timestamp>.json` files into one directory.
#[derive(Debug, Clone)]
pub struct DirectoryBackupSink {
    dir: PathBuf,
}

impl DirectoryBackupSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BackupSink for DirectoryBackupSink {
    fn store(&mut self, snapshot: &Snapshot) -> Result<PathBuf, PortError> {
        fs::create_dir_all(&self.dir).map_err(|e| PortError::io(&self.dir, e))?;
        let name = format!("fabric_backup_{}.json", Utc::now().format("%Y-%m-%d_%H%M%S%3f"));
        let path = self.dir.join(name);
        fs::write(&path, snapshot.to_json()?).map_err(|e| PortError::io(&path, e))?;
        Ok(path)
    }
}

/// Flags kept as a JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFlagStore {
    path: PathBuf,
    flags: BTreeMap<String, String>,
}

impl JsonFlagStore {
    /// A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PortError> {
        let path = path.into();
        let flags = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| PortError::io(&path, e))?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, flags })
    }
}

impl FlagStore for JsonFlagStore {
    fn is_set(&self, key: &str) -> bool {
        self.flags.get(key).is_some_and(|v| v == "true")
    }

    fn set(&mut self, key: &str) -> Result<(), PortError> {
        self.flags.insert(key.to_string(), "true".to_string());
        let content = serde_json::to_string_pretty(&self.flags)?;
        fs::write(&self.path, content).map_err(|e| PortError::io(&self.path, e))
    }
}

/// Show the first-run notice unless it was dismissed before. Returns whether
/// it was shown.
pub fn show_welcome(prompt: &mut dyn Prompt, flags: &mut dyn FlagStore) -> Result<bool, PortError> {
    if flags.is_set(WELCOME_SEEN_FLAG) {
        return Ok(false);
    }
    prompt.notify(WELCOME_NOTICE);
    flags.set(WELCOME_SEEN_FLAG)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{IdGenerator, Inventory};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Notes(Vec<String>);

    impl Prompt for Notes {
        fn confirm(&mut self, _message: &str) -> bool {
            false
        }

        fn notify(&mut self, message: &str) {
            self.0.push(message.to_string());
        }
    }

    #[test]
    fn test_welcome_shown_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flags.json");
        let mut notes = Notes::default();

        let mut flags = JsonFlagStore::open(&path).unwrap();
        assert!(show_welcome(&mut notes, &mut flags).unwrap());

        let mut reopened = JsonFlagStore::open(&path).unwrap();
        assert!(reopened.is_set(WELCOME_SEEN_FLAG));
        assert!(!show_welcome(&mut notes, &mut reopened).unwrap());
        assert_eq!(notes.0.len(), 1);
    }

    #[test]
    fn test_directory_backup_sink_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut sink = DirectoryBackupSink::new(dir.path().join("backups"));
        let inventory = Inventory::sample(&mut IdGenerator::new());

        let path = sink.store(&Snapshot::capture(&inventory, Utc::now())).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let restored = crate::snapshot::parse_backup(&written).unwrap();
        assert_eq!(restored.inventory, inventory);
    }

    #[test]
    fn test_default_offer_backup_delegates_to_confirm() {
        let mut notes = Notes::default();
        assert!(!notes.offer_backup(10));
    }
}
