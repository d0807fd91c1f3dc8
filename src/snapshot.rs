//! Full-fidelity JSON snapshot (backup) and restore
//!
//! Restore replaces all three collections wholesale. It does not check
//! cross-references or stock, so restored state may break invariants the
//! engine enforces on live operations.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::aggregates::Summary;
use crate::entities::{Fabric, Product, ProductionRecord};
use crate::inventory::Inventory;

const COLLECTION_KEYS: [&str; 3] = ["fabrics", "products", "productionRecords"];

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("Backup is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backup is missing the '{0}' collection")]
    MissingCollection(&'static str),

    #[error("Backup collection '{0}' is not a list")]
    NotAList(&'static str),

    #[error("Backup collection '{collection}' has an unreadable entry: {source}")]
    InvalidEntry {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub fabrics: Vec<Fabric>,
    pub products: Vec<Product>,
    pub production_records: Vec<ProductionRecord>,
    pub export_date: DateTime<Utc>,
    pub summary: Summary,
}

impl Snapshot {
    pub fn capture(inventory: &Inventory, export_date: DateTime<Utc>) -> Self {
        Self {
            fabrics: inventory.fabrics.clone(),
            products: inventory.products.clone(),
            production_records: inventory.production_records.clone(),
            export_date,
            summary: Summary::of(inventory).rounded(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A parsed backup awaiting confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    pub inventory: Inventory,
    /// Absent or unreadable dates are tolerated.
    pub export_date: Option<DateTime<Utc>>,
}

impl Backup {
    /// The text shown before a restore overwrites current data.
    pub fn describe(&self) -> String {
        let date = self
            .export_date
            .map_or_else(|| "unknown".to_string(), |d| d.format("%Y-%m-%d").to_string());
        format!(
            "Restoring replaces ALL current data.\n\
             Backup contains: {} fabrics, {} products, {} production records (backup date: {}).\n\
             Continue?",
            self.inventory.fabrics.len(),
            self.inventory.products.len(),
            self.inventory.production_records.len(),
            date,
        )
    }
}

/// Parse a snapshot. All three collections must be present as arrays, even
/// when empty.
pub fn parse_backup(text: &str) -> Result<Backup, RestoreError> {
    let mut root: Value = serde_json::from_str(text)?;

    for key in COLLECTION_KEYS {
        match root.get(key) {
            None | Some(Value::Null) => return Err(RestoreError::MissingCollection(key)),
            Some(Value::Array(_)) => {}
            Some(_) => return Err(RestoreError::NotAList(key)),
        }
    }

    let export_date = root
        .get("exportDate")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));

    let inventory = Inventory {
        fabrics: entries(&mut root, "fabrics")?,
        products: entries(&mut root, "products")?,
        production_records: entries(&mut root, "productionRecords")?,
    };
    Ok(Backup { inventory, export_date })
}

fn entries<T: DeserializeOwned>(root: &mut Value, collection: &'static str) -> Result<Vec<T>, RestoreError> {
    serde_json::from_value(root[collection].take())
        .map_err(|source| RestoreError::InvalidEntry { collection, source })
}
