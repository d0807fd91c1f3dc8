//! Form Validation - Rule/Policy Separation
//!
//! Forms carry raw text exactly as typed. Rules produce structured violations;
//! errors block the submit, warnings ride along with the accepted draft.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::entities::{FabricDraft, ProductDraft, ProductionRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationViolation {
    pub rule: String,
    pub field: String,
    pub severity: ViolationSeverity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Validation failed: {}", describe(.violations))]
pub struct ValidationError {
    pub violations: Vec<ValidationViolation>,
}

fn describe(violations: &[ValidationViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// An accepted value plus any non-blocking findings.
#[derive(Debug, Clone, PartialEq)]
pub struct Checked<T> {
    pub value: T,
    pub warnings: Vec<ValidationViolation>,
}

/// Validation rule trait - produces violations for one form type
pub trait ValidationRule<F> {
    fn name(&self) -> &'static str;
    fn validate(&self, form: &F) -> Vec<ValidationViolation>;
}

type FieldAccessor<F> = fn(&F) -> &str;

fn violation(rule: &str, field: &str, severity: ViolationSeverity, message: String) -> ValidationViolation {
    ValidationViolation {
        rule: rule.to_string(),
        field: field.to_string(),
        severity,
        message,
    }
}

// --- Concrete Rules ---

pub struct Required<F> {
    field: &'static str,
    value: FieldAccessor<F>,
}

impl<F> ValidationRule<F> for Required<F> {
    fn name(&self) -> &'static str { "required" }

    fn validate(&self, form: &F) -> Vec<ValidationViolation> {
        if (self.value)(form).trim().is_empty() {
            vec![violation(self.name(), self.field, ViolationSeverity::Error, "is required".to_string())]
        } else {
            vec![]
        }
    }
}

pub struct PositiveWholeNumber<F> {
    field: &'static str,
    value: FieldAccessor<F>,
}

impl<F> ValidationRule<F> for PositiveWholeNumber<F> {
    fn name(&self) -> &'static str { "positive_whole_number" }

    fn validate(&self, form: &F) -> Vec<ValidationViolation> {
        let raw = (self.value)(form).trim();
        match raw.parse::<u32>() {
            Ok(n) if n > 0 => vec![],
            _ => vec![violation(
                self.name(),
                self.field,
                ViolationSeverity::Error,
                format!("'{raw}' is not a positive whole number"),
            )],
        }
    }
}

pub struct PositiveNumber<F> {
    field: &'static str,
    value: FieldAccessor<F>,
}

impl<F> ValidationRule<F> for PositiveNumber<F> {
    fn name(&self) -> &'static str { "positive_number" }

    fn validate(&self, form: &F) -> Vec<ValidationViolation> {
        let raw = (self.value)(form).trim();
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() && n > 0.0 => vec![],
            _ => vec![violation(
                self.name(),
                self.field,
                ViolationSeverity::Error,
                format!("'{raw}' is not a positive number"),
            )],
        }
    }
}

/// Lenient number: blank or unreadable input becomes 0 with a warning, and a
/// negative value is accepted with a warning.
pub struct LenientNumber<F> {
    field: &'static str,
    value: FieldAccessor<F>,
}

impl<F> ValidationRule<F> for LenientNumber<F> {
    fn name(&self) -> &'static str { "number" }

    fn validate(&self, form: &F) -> Vec<ValidationViolation> {
        let raw = (self.value)(form).trim();
        if raw.is_empty() {
            return vec![];
        }
        match raw.parse::<f64>() {
            Ok(n) if n < 0.0 => vec![violation(
                self.name(),
                self.field,
                ViolationSeverity::Warning,
                format!("negative value {n}"),
            )],
            Ok(n) if n.is_finite() => vec![],
            _ => vec![violation(
                self.name(),
                self.field,
                ViolationSeverity::Warning,
                format!("'{raw}' is not a number, using 0"),
            )],
        }
    }
}

pub struct IsoDate<F> {
    field: &'static str,
    value: FieldAccessor<F>,
}

impl<F> ValidationRule<F> for IsoDate<F> {
    fn name(&self) -> &'static str { "iso_date" }

    fn validate(&self, form: &F) -> Vec<ValidationViolation> {
        let raw = (self.value)(form).trim();
        if raw.is_empty() || parse_date(raw).is_some() {
            vec![]
        } else {
            vec![violation(
                self.name(),
                self.field,
                ViolationSeverity::Error,
                format!("'{raw}' is not a YYYY-MM-DD date"),
            )]
        }
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator<F> {
    rules: Vec<Box<dyn ValidationRule<F>>>,
}

impl<F: 'static> Validator<F> {
    pub fn new() -> Self {
        Self { rules: vec![] }
    }

    pub fn with_rule(mut self, rule: impl ValidationRule<F> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn required(self, field: &'static str, value: FieldAccessor<F>) -> Self {
        self.with_rule(Required { field, value })
    }

    pub fn positive_number(self, field: &'static str, value: FieldAccessor<F>) -> Self {
        self.with_rule(PositiveNumber { field, value })
    }

    pub fn positive_whole_number(self, field: &'static str, value: FieldAccessor<F>) -> Self {
        self.with_rule(PositiveWholeNumber { field, value })
    }

    pub fn lenient_number(self, field: &'static str, value: FieldAccessor<F>) -> Self {
        self.with_rule(LenientNumber { field, value })
    }

    pub fn iso_date(self, field: &'static str, value: FieldAccessor<F>) -> Self {
        self.with_rule(IsoDate { field, value })
    }

    /// Errors block; warnings are returned for the caller to surface.
    pub fn validate(&self, form: &F) -> Result<Vec<ValidationViolation>, ValidationError> {
        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(form))
            .partition(|v| v.severity == ViolationSeverity::Error);

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ValidationError { violations: errors })
        }
    }
}

impl<F: 'static> Default for Validator<F> {
    fn default() -> Self {
        Self::new()
    }
}

// --- Forms ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FabricForm {
    #[serde(deserialize_with = "text_or_number")]
    pub code: String,
    #[serde(deserialize_with = "text_or_number")]
    pub material: String,
    #[serde(deserialize_with = "text_or_number")]
    pub color: String,
    #[serde(deserialize_with = "text_or_number")]
    pub width: String,
    #[serde(deserialize_with = "text_or_number")]
    pub current_length: String,
    #[serde(deserialize_with = "text_or_number")]
    pub price: String,
}

impl FabricForm {
    pub fn validator() -> Validator<Self> {
        Validator::<Self>::new()
            .required("code", |f| f.code.as_str())
            .required("material", |f| f.material.as_str())
            .lenient_number("currentLength", |f| f.current_length.as_str())
            .lenient_number("price", |f| f.price.as_str())
    }

    pub fn check(&self) -> Result<Checked<FabricDraft>, ValidationError> {
        let warnings = Self::validator().validate(self)?;
        Ok(Checked {
            value: FabricDraft {
                code: self.code.trim().to_string(),
                material: self.material.trim().to_string(),
                color: self.color.trim().to_string(),
                width: self.width.trim().to_string(),
                current_length: number_or_zero(&self.current_length),
                price: number_or_zero(&self.price),
            },
            warnings,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductForm {
    #[serde(deserialize_with = "text_or_number")]
    pub code: String,
    #[serde(deserialize_with = "text_or_number")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "text_or_number")]
    pub kind: String,
    #[serde(deserialize_with = "text_or_number")]
    pub fabric_code: String,
    #[serde(deserialize_with = "text_or_number")]
    pub fabric_usage: String,
}

impl ProductForm {
    pub fn validator() -> Validator<Self> {
        Validator::<Self>::new()
            .required("code", |f| f.code.as_str())
            .required("name", |f| f.name.as_str())
            .positive_number("fabricUsage", |f| f.fabric_usage.as_str())
    }

    pub fn check(&self) -> Result<Checked<ProductDraft>, ValidationError> {
        let warnings = Self::validator().validate(self)?;
        Ok(Checked {
            value: ProductDraft {
                code: self.code.trim().to_string(),
                name: self.name.trim().to_string(),
                kind: self.kind.trim().to_string(),
                fabric_code: self.fabric_code.trim().to_string(),
                fabric_usage: number_or_zero(&self.fabric_usage),
            },
            warnings,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductionForm {
    /// `YYYY-MM-DD`; blank means today.
    #[serde(deserialize_with = "text_or_number")]
    pub date: String,
    #[serde(deserialize_with = "text_or_number")]
    pub product_code: String,
    #[serde(deserialize_with = "text_or_number")]
    pub quantity: String,
    #[serde(deserialize_with = "text_or_number")]
    pub notes: String,
}

impl ProductionForm {
    pub fn validator() -> Validator<Self> {
        Validator::<Self>::new()
            .required("productCode", |f| f.product_code.as_str())
            .positive_whole_number("quantity", |f| f.quantity.as_str())
            .iso_date("date", |f| f.date.as_str())
    }

    pub fn check(&self) -> Result<Checked<ProductionRequest>, ValidationError> {
        let warnings = Self::validator().validate(self)?;
        let date = parse_date(self.date.trim()).unwrap_or_else(|| Local::now().date_naive());
        Ok(Checked {
            value: ProductionRequest {
                date,
                product_code: self.product_code.trim().to_string(),
                quantity: self.quantity.trim().parse().unwrap_or_default(),
                notes: self.notes.trim().to_string(),
            },
            warnings,
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

pub(crate) fn number_or_zero(raw: &str) -> f64 {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// Accept `"12.5"` and `12.5` alike for form fields.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fabric_form(code: &str, material: &str, length: &str) -> FabricForm {
        FabricForm {
            code: code.to_string(),
            material: material.to_string(),
            current_length: length.to_string(),
            price: "48000".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fabric_requires_code_and_material() {
        let err = fabric_form("", " ", "10").check().unwrap_err();
        let fields: Vec<_> = err.violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["code", "material"]);
        assert!(err.to_string().starts_with("Validation failed"));
    }

    #[test]
    fn test_fabric_numbers_are_lenient() {
        let checked = fabric_form("VAI009", "Silk", "").check().unwrap();
        assert_eq!(checked.value.current_length, 0.0);
        assert_eq!(checked.value.price, 48000.0);
        assert!(checked.warnings.is_empty());

        let checked = fabric_form("VAI009", "Silk", "lots").check().unwrap();
        assert_eq!(checked.value.current_length, 0.0);
        assert_eq!(checked.warnings.len(), 1);
    }

    #[test]
    fn test_negative_stock_is_a_warning() {
        let checked = fabric_form("VAI009", "Silk", "-4").check().unwrap();
        assert_eq!(checked.value.current_length, -4.0);
        assert_eq!(checked.warnings[0].severity, ViolationSeverity::Warning);
    }

    #[test]
    fn test_product_usage_must_be_positive() {
        let form = ProductForm {
            code: "SP9".to_string(),
            name: "Cushion".to_string(),
            fabric_usage: "0".to_string(),
            ..Default::default()
        };
        let err = form.check().unwrap_err();
        assert_eq!(err.violations[0].rule, "positive_number");
    }

    #[test]
    fn test_production_quantity_rules() {
        for bad in ["", "abc", "0", "-2", "1.5"] {
            let form = ProductionForm {
                product_code: "SP001".to_string(),
                quantity: bad.to_string(),
                ..Default::default()
            };
            assert!(form.check().is_err(), "quantity {bad:?} should be rejected");
        }

        let form = ProductionForm {
            date: "2024-08-05".to_string(),
            product_code: "SP001".to_string(),
            quantity: " 12 ".to_string(),
            notes: "rush order".to_string(),
        };
        let request = form.check().unwrap().value;
        assert_eq!(request.quantity, 12);
        assert_eq!(request.date, NaiveDate::from_ymd_opt(2024, 8, 5).unwrap());
    }

    #[test]
    fn test_production_bad_date() {
        let form = ProductionForm {
            date: "05/08/2024".to_string(),
            product_code: "SP001".to_string(),
            quantity: "1".to_string(),
            ..Default::default()
        };
        let err = form.check().unwrap_err();
        assert_eq!(err.violations[0].field, "date");
    }

    #[test]
    fn test_forms_accept_json_numbers() {
        let form: FabricForm = serde_json::from_str(
            r#"{"code": "VAI010", "material": "Linen", "currentLength": 120.5, "price": 30000}"#,
        )
        .unwrap();
        assert_eq!(form.current_length, "120.5");
        assert_eq!(form.price, "30000");
        assert_eq!(form.color, "");
    }
}
