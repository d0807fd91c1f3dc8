//! Delimited-text import
//!
//! Header names are mapped to entity fields through an [`ImportSchema`], so a
//! column can be recognised under several aliases. Parsing is all-or-nothing:
//! the first bad row rejects the whole batch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::entities::{Collection, Fabric, Product};
use crate::inventory::IdGenerator;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("Nothing to import: the text is empty")]
    Empty,

    #[error("Import needs a header row and at least one data row")]
    NoDataRows,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Line {line}: '{field}' is empty")]
    EmptyField { line: u64, field: String },

    #[error("Line {line}: '{value}' in '{field}' is not a number")]
    InvalidNumber { line: u64, field: String, value: String },

    #[error("{0} cannot be imported from delimited text")]
    Unsupported(Collection),

    #[error("CSV parse failed: {0}")]
    Csv(String),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Csv(err.to_string())
    }
}

/// One entity field and the header names that may carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub field: String,
    pub aliases: Vec<String>,
    /// Column must be present and every row must fill it.
    #[serde(default)]
    pub required: bool,
}

impl ColumnSpec {
    fn new(field: &str, aliases: &[&str], required: bool) -> Self {
        Self {
            field: field.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            required,
        }
    }

    fn display_name(&self) -> &str {
        self.aliases.first().map_or(self.field.as_str(), String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportSchema {
    pub columns: Vec<ColumnSpec>,
}

impl ImportSchema {
    pub fn fabrics() -> Self {
        Self {
            columns: vec![
                ColumnSpec::new("code", &["Fabric code"], true),
                ColumnSpec::new("material", &["Material"], true),
                ColumnSpec::new("color", &["Color"], false),
                ColumnSpec::new("width", &["Width"], false),
                ColumnSpec::new("currentLength", &["Stock (m)", "Stock"], false),
                ColumnSpec::new("price", &["Unit price", "Price"], false),
            ],
        }
    }

    pub fn products() -> Self {
        Self {
            columns: vec![
                ColumnSpec::new("code", &["Product code"], true),
                ColumnSpec::new("name", &["Product name"], true),
                ColumnSpec::new("type", &["Type"], false),
                ColumnSpec::new("fabricCode", &["Fabric code"], false),
                ColumnSpec::new("fabricUsage", &["Usage (m/unit)", "Usage"], false),
            ],
        }
    }
}

/// A data row keyed by entity field name.
#[derive(Debug, Clone)]
struct MappedRow {
    line: u64,
    values: HashMap<String, String>,
}

impl MappedRow {
    fn text(&self, field: &str) -> String {
        self.values.get(field).cloned().unwrap_or_default()
    }

    fn number(&self, field: &str) -> Result<f64, ImportError> {
        let raw = self.text(field);
        if raw.is_empty() {
            return Ok(0.0);
        }
        raw.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| ImportError::InvalidNumber {
                line: self.line,
                field: field.to_string(),
                value: raw,
            })
    }
}

fn map_rows(text: &str, schema: &ImportSchema, delimiter: u8) -> Result<Vec<MappedRow>, ImportError> {
    if text.trim().is_empty() {
        return Err(ImportError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim().as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let index_of: Vec<Vec<usize>> = schema
        .columns
        .iter()
        .map(|column| {
            column
                .aliases
                .iter()
                .filter_map(|alias| headers.iter().position(|h| h == alias))
                .collect()
        })
        .collect();

    let missing: Vec<String> = schema
        .columns
        .iter()
        .zip(&index_of)
        .filter(|(column, found)| column.required && found.is_empty())
        .map(|(column, _)| column.display_name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut rows = vec![];
    for (offset, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map_or(offset as u64 + 2, |p| p.line());

        let mut values = HashMap::new();
        for (column, indexes) in schema.columns.iter().zip(&index_of) {
            let value = indexes
                .iter()
                .filter_map(|&i| record.get(i))
                .find(|v| !v.is_empty())
                .unwrap_or_default();
            if column.required && value.is_empty() {
                return Err(ImportError::EmptyField {
                    line,
                    field: column.display_name().to_string(),
                });
            }
            values.insert(column.field.clone(), value.to_string());
        }
        rows.push(MappedRow { line, values });
    }

    if rows.is_empty() {
        return Err(ImportError::NoDataRows);
    }
    Ok(rows)
}

pub fn parse_fabrics(
    text: &str,
    schema: &ImportSchema,
    delimiter: u8,
    ids: &mut IdGenerator,
) -> Result<Vec<Fabric>, ImportError> {
    map_rows(text, schema, delimiter)?
        .iter()
        .map(|row| {
            Ok(Fabric {
                id: ids.next_id(),
                code: row.text("code"),
                material: row.text("material"),
                color: row.text("color"),
                width: row.text("width"),
                current_length: row.number("currentLength")?,
                price: row.number("price")?,
            })
        })
        .collect()
}

pub fn parse_products(
    text: &str,
    schema: &ImportSchema,
    delimiter: u8,
    ids: &mut IdGenerator,
) -> Result<Vec<Product>, ImportError> {
    map_rows(text, schema, delimiter)?
        .iter()
        .map(|row| {
            Ok(Product {
                id: ids.next_id(),
                code: row.text("code"),
                name: row.text("name"),
                kind: row.text("type"),
                fabric_code: row.text("fabricCode"),
                fabric_usage: row.number("fabricUsage")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fabrics(text: &str) -> Result<Vec<Fabric>, ImportError> {
        parse_fabrics(text, &ImportSchema::fabrics(), b',', &mut IdGenerator::new())
    }

    #[test]
    fn test_parse_fabrics_with_aliases() {
        let text = "Fabric code,Material,Color,Stock,Price\n\
                    VAI010,Linen,\"Beige, light\",120.5,30000\n\
                    VAI011,Silk,,,\n";
        let parsed = fabrics(text).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].color, "Beige, light");
        assert_eq!(parsed[0].current_length, 120.5);
        assert_eq!(parsed[0].price, 30000.0);
        assert_eq!(parsed[1].current_length, 0.0);
        assert!(parsed[0].id < parsed[1].id);
    }

    #[test]
    fn test_missing_required_column() {
        let err = fabrics("Fabric code,Color\nVAI010,Red\n").unwrap_err();
        assert_eq!(err, ImportError::MissingColumns(vec!["Material".to_string()]));
    }

    #[test]
    fn test_empty_mandatory_cell_reports_line() {
        let text = "Product code,Product name\nSP1,Sheet\nSP2,\n";
        let err = parse_products(text, &ImportSchema::products(), b',', &mut IdGenerator::new()).unwrap_err();
        assert_eq!(
            err,
            ImportError::EmptyField { line: 3, field: "Product name".to_string() }
        );
    }

    #[test]
    fn test_bad_number_rejects_batch() {
        let err = fabrics("Fabric code,Material,Stock (m)\nA,Cotton,10\nB,Cotton,ten\n").unwrap_err();
        assert!(matches!(err, ImportError::InvalidNumber { line: 3, .. }));
    }

    #[test]
    fn test_whitespace_only_lines_are_skipped() {
        let parsed = fabrics("Fabric code,Material\nA,Cotton\n   \nB,Silk\n").unwrap();
        let codes: Vec<_> = parsed.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B"]);

        let err = fabrics("Fabric code,Material\nA,Cotton\n  \t \nB,\n").unwrap_err();
        assert_eq!(err, ImportError::EmptyField { line: 4, field: "Material".to_string() });
    }

    #[test]
    fn test_header_only_and_empty() {
        assert_eq!(fabrics("   \n").unwrap_err(), ImportError::Empty);
        assert_eq!(fabrics("Fabric code,Material\n").unwrap_err(), ImportError::NoDataRows);
    }

    #[test]
    fn test_custom_alias_schema() {
        let schema: ImportSchema = serde_json::from_str(
            r#"[
                {"field": "code", "aliases": ["Ma vai", "Code"], "required": true},
                {"field": "material", "aliases": ["Chat lieu"], "required": true}
            ]"#,
        )
        .unwrap();
        let parsed = parse_fabrics("Code;Chat lieu\nX1;Wool\n", &schema, b';', &mut IdGenerator::new()).unwrap();
        assert_eq!(parsed[0].code, "X1");
        assert_eq!(parsed[0].material, "Wool");
    }
}
