//! Delimited-text export
//!
//! Each collection is flattened into a row type whose serde names are the
//! column headers; the csv writer takes the header row from the first record
//! and quotes any field holding the delimiter or a quote (quotes doubled).

use serde::Serialize;
use thiserror::Error;

use crate::engine::round_length;
use crate::entities::{Collection, Fabric, Product, ProductionRecord};
use crate::inventory::Inventory;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV buffer error: {0}")]
    Buffer(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FabricRow {
    #[serde(rename = "Fabric code")]
    pub code: String,
    #[serde(rename = "Material")]
    pub material: String,
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Width")]
    pub width: String,
    #[serde(rename = "Stock (m)")]
    pub current_length: f64,
    #[serde(rename = "Unit price")]
    pub price: f64,
    #[serde(rename = "Value")]
    pub value: f64,
}

impl From<&Fabric> for FabricRow {
    fn from(f: &Fabric) -> Self {
        Self {
            code: f.code.clone(),
            material: f.material.clone(),
            color: f.color.clone(),
            width: f.width.clone(),
            current_length: f.current_length,
            price: f.price,
            value: f.stock_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    #[serde(rename = "Product code")]
    pub code: String,
    #[serde(rename = "Product name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Fabric code")]
    pub fabric_code: String,
    #[serde(rename = "Usage (m/unit)")]
    pub fabric_usage: f64,
}

impl From<&Product> for ProductRow {
    fn from(p: &Product) -> Self {
        Self {
            code: p.code.clone(),
            name: p.name.clone(),
            kind: p.kind.clone(),
            fabric_code: p.fabric_code.clone(),
            fabric_usage: p.fabric_usage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Product code")]
    pub product_code: String,
    #[serde(rename = "Product name")]
    pub product_name: String,
    #[serde(rename = "Quantity")]
    pub quantity: u32,
    #[serde(rename = "Fabric used (m)")]
    pub fabric_used: f64,
    #[serde(rename = "Fabric value")]
    pub fabric_value: f64,
    #[serde(rename = "Notes")]
    pub notes: String,
}

impl From<&ProductionRecord> for ProductionRow {
    fn from(r: &ProductionRecord) -> Self {
        Self {
            date: r.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            product_code: r.product_code.clone(),
            product_name: r.snapshot.product_name.clone(),
            quantity: r.quantity,
            fabric_used: round_length(r.fabric_used()),
            fabric_value: r.fabric_value(),
            notes: r.notes.clone(),
        }
    }
}

/// Exported text and whether it is the format sample for an empty collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportText {
    pub collection: Collection,
    pub text: String,
    pub sample: bool,
    pub rows: usize,
}

/// Serialize homogeneous flat rows; the header comes from the first row.
pub fn to_delimited<T: Serialize>(rows: &[T], delimiter: u8) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Buffer(e.to_string()))
}

/// Export one collection. An empty collection exports a single sample row
/// showing the import format.
pub fn export_collection(
    inventory: &Inventory,
    collection: Collection,
    delimiter: u8,
) -> Result<ExportText, ExportError> {
    let (text, rows, sample) = match collection {
        Collection::Fabrics => {
            let rows: Vec<FabricRow> = inventory.fabrics.iter().map(FabricRow::from).collect();
            if rows.is_empty() {
                (to_delimited(&[sample_fabric_row()], delimiter)?, 1, true)
            } else {
                (to_delimited(&rows, delimiter)?, rows.len(), false)
            }
        }
        Collection::Products => {
            let rows: Vec<ProductRow> = inventory.products.iter().map(ProductRow::from).collect();
            if rows.is_empty() {
                (to_delimited(&[sample_product_row()], delimiter)?, 1, true)
            } else {
                (to_delimited(&rows, delimiter)?, rows.len(), false)
            }
        }
        Collection::Production => {
            let rows: Vec<ProductionRow> = inventory
                .production_records
                .iter()
                .map(ProductionRow::from)
                .collect();
            if rows.is_empty() {
                (to_delimited(&[sample_production_row()], delimiter)?, 1, true)
            } else {
                (to_delimited(&rows, delimiter)?, rows.len(), false)
            }
        }
    };
    Ok(ExportText { collection, text, sample, rows })
}

fn sample_fabric_row() -> FabricRow {
    FabricRow {
        code: "VAI001".to_string(),
        material: "Cotton".to_string(),
        color: "White".to_string(),
        width: "1.6m".to_string(),
        current_length: 100.0,
        price: 50000.0,
        value: 5_000_000.0,
    }
}

fn sample_product_row() -> ProductRow {
    ProductRow {
        code: "SP001".to_string(),
        name: "Double bedding set".to_string(),
        kind: "Bedding set".to_string(),
        fabric_code: "VAI001".to_string(),
        fabric_usage: 5.5,
    }
}

fn sample_production_row() -> ProductionRow {
    ProductionRow {
        date: "2024-08-05".to_string(),
        product_code: "SP001".to_string(),
        product_name: "Double bedding set".to_string(),
        quantity: 10,
        fabric_used: 55.0,
        fabric_value: 2_750_000.0,
        notes: "Sample order".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityId;

    #[derive(Serialize)]
    struct Flat {
        name: String,
        note: String,
    }

    #[test]
    fn test_header_from_first_record_and_quoting() {
        let rows = vec![
            Flat { name: "plain".to_string(), note: "a,b".to_string() },
            Flat { name: "say \"hi\"".to_string(), note: String::from("x") },
        ];
        let text = to_delimited(&rows, b',').unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "name,note");
        assert_eq!(lines[1], "plain,\"a,b\"");
        assert_eq!(lines[2], "\"say \"\"hi\"\"\",x");
    }

    #[test]
    fn test_custom_delimiter() {
        let rows = vec![Flat { name: "a;b".to_string(), note: "c,d".to_string() }];
        let text = to_delimited(&rows, b';').unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "\"a;b\";c,d");
    }

    #[test]
    fn test_empty_collection_exports_sample() {
        let export = export_collection(&Inventory::new(), Collection::Products, b',').unwrap();
        assert!(export.sample);
        assert_eq!(export.rows, 1);
        assert!(export.text.starts_with("Product code,Product name,Type,Fabric code,Usage (m/unit)"));
        assert!(export.text.contains("SP001"));
    }

    #[test]
    fn test_fabric_export_includes_value() {
        let inventory = Inventory {
            fabrics: vec![Fabric {
                id: EntityId(1),
                code: "VAI002".to_string(),
                material: "Polyester".to_string(),
                color: "Blue".to_string(),
                width: "2.0m".to_string(),
                current_length: 10.0,
                price: 4.0,
            }],
            products: vec![],
            production_records: vec![],
        };
        let export = export_collection(&inventory, Collection::Fabrics, b',').unwrap();
        assert!(!export.sample);

        let mut reader = csv::Reader::from_reader(export.text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[6], "Value");
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "VAI002");
        assert_eq!(row[6].parse::<f64>().unwrap(), 40.0);
    }
}
