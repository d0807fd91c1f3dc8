//! Entity Store - the three live collections
//!
//! Lookups by business code return the first match, since codes are not
//! unique. Direct fabric/product maintenance lives here; stock movements
//! driven by production go through the engine.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::entities::{EntityId, Fabric, FabricDraft, Product, ProductDraft, ProductionRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub fabrics: Vec<Fabric>,
    pub products: Vec<Product>,
    pub production_records: Vec<ProductionRecord>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starter catalog used when a session opens with nothing loaded.
    pub fn sample(ids: &mut IdGenerator) -> Self {
        let fabrics = vec![
            sample_fabric(ids.next_id(), "VAI001", "Cotton", "White", "1.6m", 200.0, 55000.0),
            sample_fabric(ids.next_id(), "VAI002", "Polyester", "Blue", "2.0m", 120.0, 48000.0),
            sample_fabric(ids.next_id(), "VAI003", "Satin", "Pink", "1.5m", 80.0, 75000.0),
        ];
        let products = vec![
            Product {
                id: ids.next_id(),
                code: "SP001".to_string(),
                name: "Double bedding set".to_string(),
                kind: "Bedding set".to_string(),
                fabric_code: "VAI001".to_string(),
                fabric_usage: 5.5,
            },
            Product {
                id: ids.next_id(),
                code: "SP002".to_string(),
                name: "Down body pillow".to_string(),
                kind: "Pillow".to_string(),
                fabric_code: "VAI002".to_string(),
                fabric_usage: 1.2,
            },
        ];
        Self { fabrics, products, production_records: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    pub fn total_records(&self) -> usize {
        self.fabrics.len() + self.products.len() + self.production_records.len()
    }

    // --- Lookups ---

    pub fn fabric(&self, id: EntityId) -> Option<&Fabric> {
        self.fabrics.iter().find(|f| f.id == id)
    }

    pub fn fabric_by_code(&self, code: &str) -> Option<&Fabric> {
        self.fabrics.iter().find(|f| f.code == code)
    }

    pub(crate) fn fabric_by_code_mut(&mut self, code: &str) -> Option<&mut Fabric> {
        self.fabrics.iter_mut().find(|f| f.code == code)
    }

    pub fn product(&self, id: EntityId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn product_by_code(&self, code: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.code == code)
    }

    pub fn record(&self, id: EntityId) -> Option<&ProductionRecord> {
        self.production_records.iter().find(|r| r.id == id)
    }

    pub(crate) fn record_mut(&mut self, id: EntityId) -> Option<&mut ProductionRecord> {
        self.production_records.iter_mut().find(|r| r.id == id)
    }

    // --- Fabric maintenance ---

    pub fn insert_fabric(&mut self, fabric: Fabric) {
        self.fabrics.push(fabric);
    }

    /// Overwrite every editable field. No stock validation: a direct edit may
    /// set any length, negative included.
    pub fn replace_fabric(&mut self, id: EntityId, draft: FabricDraft) -> bool {
        match self.fabrics.iter_mut().find(|f| f.id == id) {
            Some(fabric) => {
                *fabric = Fabric::from_draft(id, draft);
                true
            }
            None => false,
        }
    }

    pub fn remove_fabric(&mut self, id: EntityId) -> Option<Fabric> {
        let index = self.fabrics.iter().position(|f| f.id == id)?;
        Some(self.fabrics.remove(index))
    }

    // --- Product maintenance ---

    pub fn insert_product(&mut self, product: Product) {
        self.products.push(product);
    }

    pub fn replace_product(&mut self, id: EntityId, draft: ProductDraft) -> bool {
        match self.products.iter_mut().find(|p| p.id == id) {
            Some(product) => {
                *product = Product::from_draft(id, draft);
                true
            }
            None => false,
        }
    }

    pub fn remove_product(&mut self, id: EntityId) -> Option<Product> {
        let index = self.products.iter().position(|p| p.id == id)?;
        Some(self.products.remove(index))
    }

    /// Returns how many products were dropped. Records keep their stale
    /// denormalized product data.
    pub fn clear_products(&mut self) -> usize {
        let count = self.products.len();
        self.products.clear();
        count
    }
}

fn sample_fabric(id: EntityId, code: &str, material: &str, color: &str, width: &str, length: f64, price: f64) -> Fabric {
    Fabric {
        id,
        code: code.to_string(),
        material: material.to_string(),
        color: color.to_string(),
        width: width.to_string(),
        current_length: length,
        price,
    }
}

/// Millisecond-clock id source.
///
/// Ids never go backwards; two ids requested within the same millisecond get
/// consecutive values. Once `i64::MAX` is taken, ids continue downward from
/// the lowest id seen.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: i64,
    lowest: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start above every id already present in `inventory`.
    pub fn after(inventory: &Inventory) -> Self {
        let ids: Vec<i64> = inventory
            .fabrics
            .iter()
            .map(|f| f.id.0)
            .chain(inventory.products.iter().map(|p| p.id.0))
            .chain(inventory.production_records.iter().map(|r| r.id.0))
            .collect();
        Self {
            last: ids.iter().copied().max().unwrap_or(0),
            lowest: ids.iter().copied().min().unwrap_or(0).min(0),
        }
    }

    pub fn next_id(&mut self) -> EntityId {
        match self.last.checked_add(1) {
            Some(next) => {
                self.last = Utc::now().timestamp_millis().max(next);
                EntityId(self.last)
            }
            None => {
                self.lowest = self.lowest.saturating_sub(1);
                EntityId(self.lowest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(code: &str, length: f64) -> FabricDraft {
        FabricDraft {
            code: code.to_string(),
            material: "Linen".to_string(),
            color: String::new(),
            width: String::new(),
            current_length: length,
            price: 10.0,
        }
    }

    #[test]
    fn test_ids_strictly_increase() {
        let mut ids = IdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        let c = ids.next_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_ids_start_after_existing() {
        let mut inventory = Inventory::new();
        inventory.insert_fabric(Fabric::from_draft(EntityId(i64::MAX / 2), draft("A", 1.0)));
        let mut ids = IdGenerator::after(&inventory);
        assert!(ids.next_id().0 > i64::MAX / 2);
    }

    #[test]
    fn test_ids_after_max_id_do_not_overflow() {
        let mut inventory = Inventory::new();
        inventory.insert_fabric(Fabric::from_draft(EntityId(i64::MAX), draft("A", 1.0)));
        inventory.insert_fabric(Fabric::from_draft(EntityId(5), draft("B", 1.0)));
        let mut ids = IdGenerator::after(&inventory);
        assert_eq!(ids.next_id(), EntityId(-1));
        assert_eq!(ids.next_id(), EntityId(-2));
    }

    #[test]
    fn test_code_lookup_returns_first_duplicate() {
        let mut inventory = Inventory::new();
        inventory.insert_fabric(Fabric::from_draft(EntityId(1), draft("DUP", 5.0)));
        inventory.insert_fabric(Fabric::from_draft(EntityId(2), draft("DUP", 9.0)));
        assert_eq!(inventory.fabric_by_code("DUP").unwrap().id, EntityId(1));
    }

    #[test]
    fn test_replace_fabric_allows_negative_length() {
        let mut inventory = Inventory::new();
        inventory.insert_fabric(Fabric::from_draft(EntityId(1), draft("A", 5.0)));
        assert!(inventory.replace_fabric(EntityId(1), draft("A", -3.0)));
        assert_eq!(inventory.fabric(EntityId(1)).unwrap().current_length, -3.0);
        assert!(!inventory.replace_fabric(EntityId(99), draft("B", 1.0)));
    }

    #[test]
    fn test_sample_catalog() {
        let mut ids = IdGenerator::new();
        let inventory = Inventory::sample(&mut ids);
        assert_eq!(inventory.fabrics.len(), 3);
        assert_eq!(inventory.products.len(), 2);
        assert!(inventory.production_records.is_empty());
        assert_eq!(inventory.product_by_code("SP002").unwrap().fabric_code, "VAI002");
    }
}
