//! Entity Model - Fabrics, Products, Production Records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp-derived identifier shared by all three collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fabric {
    pub id: EntityId,
    pub code: String,
    pub material: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub width: String,
    /// Remaining stock in meters.
    pub current_length: f64,
    /// Price per meter.
    pub price: f64,
}

impl Fabric {
    pub fn from_draft(id: EntityId, draft: FabricDraft) -> Self {
        Self {
            id,
            code: draft.code,
            material: draft.material,
            color: draft.color,
            width: draft.width,
            current_length: draft.current_length,
            price: draft.price,
        }
    }

    pub fn stock_value(&self) -> f64 {
        self.current_length * self.price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: EntityId,
    pub code: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Soft reference to `Fabric::code`. Never checked for existence.
    #[serde(default)]
    pub fabric_code: String,
    /// Meters of fabric consumed per unit produced.
    pub fabric_usage: f64,
}

impl Product {
    pub fn from_draft(id: EntityId, draft: ProductDraft) -> Self {
        Self {
            id,
            code: draft.code,
            name: draft.name,
            kind: draft.kind,
            fabric_code: draft.fabric_code,
            fabric_usage: draft.fabric_usage,
        }
    }
}

/// Values captured when a production record is written.
///
/// These are copies, not joins: later edits to the product or fabric do not
/// flow back into records that already hold a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionSnapshot {
    pub product_name: String,
    pub fabric_code: String,
    /// Fabric consumed, rounded to one decimal.
    pub fabric_used: f64,
    /// Unrounded `required x price` at write time.
    #[serde(default)]
    pub fabric_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionRecord {
    pub id: EntityId,
    /// Blank or unreadable dates in older backups load as `None`.
    #[serde(default, with = "lenient_date")]
    pub date: Option<NaiveDate>,
    pub product_code: String,
    pub quantity: u32,
    #[serde(flatten)]
    pub snapshot: ConsumptionSnapshot,
    #[serde(default)]
    pub notes: String,
}

impl ProductionRecord {
    pub fn fabric_used(&self) -> f64 {
        self.snapshot.fabric_used
    }

    pub fn fabric_value(&self) -> f64 {
        self.snapshot.fabric_value
    }
}

/// `YYYY-MM-DD`, written as `""` when absent.
mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.collect_str(&d.format(FORMAT)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), FORMAT).ok()))
    }
}

/// Validated fabric fields, ready to be stored under a fresh or existing id.
#[derive(Debug, Clone, PartialEq)]
pub struct FabricDraft {
    pub code: String,
    pub material: String,
    pub color: String,
    pub width: String,
    pub current_length: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub code: String,
    pub name: String,
    pub kind: String,
    pub fabric_code: String,
    pub fabric_usage: f64,
}

/// A validated request to log a production run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRequest {
    pub date: NaiveDate,
    pub product_code: String,
    pub quantity: u32,
    pub notes: String,
}

/// Which collection an import or export targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Fabrics,
    Products,
    Production,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collection::Fabrics => "fabrics",
            Collection::Products => "products",
            Collection::Production => "production",
        };
        f.write_str(name)
    }
}
