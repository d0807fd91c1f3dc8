//! Settings - JSON file with per-field defaults

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::import::ImportSchema;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Delimiter must be a single ASCII character, got {0:?}")]
    Delimiter(char),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_flag_file")]
    pub flag_file: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "ImportSchema::fabrics")]
    pub fabric_columns: ImportSchema,
    #[serde(default = "ImportSchema::products")]
    pub product_columns: ImportSchema,
    #[serde(default = "default_true")]
    pub load_samples: bool,
}

fn default_backup_dir() -> PathBuf { PathBuf::from("backups") }
fn default_flag_file() -> PathBuf { PathBuf::from(".fabricworks-flags.json") }
fn default_delimiter() -> char { ',' }
fn default_true() -> bool { true }

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            flag_file: default_flag_file(),
            delimiter: default_delimiter(),
            fabric_columns: ImportSchema::fabrics(),
            product_columns: ImportSchema::products(),
            load_samples: true,
        }
    }
}

impl Settings {
    /// Load from `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.delimiter_byte()?;
        Ok(settings)
    }

    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        if self.delimiter.is_ascii() && !matches!(self.delimiter, '"' | '\n' | '\r') {
            Ok(self.delimiter as u8)
        } else {
            Err(ConfigError::Delimiter(self.delimiter))
        }
    }
}
