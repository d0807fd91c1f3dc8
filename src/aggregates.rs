//! Derived Aggregates
//!
//! Pure reads over an [`Inventory`]. Nothing here is cached; callers recompute
//! after every change.

use serde::{Deserialize, Serialize};

use crate::engine::round_length;
use crate::entities::{Fabric, ProductionRecord};
use crate::inventory::Inventory;

/// Fabrics strictly below this length (meters) need reordering.
pub const LOW_STOCK_THRESHOLD: f64 = 150.0;

/// How many production runs the dashboard shows.
pub const RECENT_PRODUCTION_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_items: usize,
    pub total_value: f64,
    pub low_stock: usize,
    pub total_used: f64,
}

impl Summary {
    pub fn of(inventory: &Inventory) -> Self {
        Self {
            total_items: inventory.fabrics.len(),
            total_value: total_value(inventory),
            low_stock: low_stock(inventory).count(),
            total_used: total_used(inventory),
        }
    }

    /// Copy with `total_used` rounded to one decimal, as shown to users.
    pub fn rounded(self) -> Self {
        Self { total_used: round_length(self.total_used), ..self }
    }
}

pub fn total_value(inventory: &Inventory) -> f64 {
    inventory.fabrics.iter().map(Fabric::stock_value).sum()
}

pub fn is_low_stock(fabric: &Fabric) -> bool {
    fabric.current_length < LOW_STOCK_THRESHOLD
}

pub fn low_stock(inventory: &Inventory) -> impl Iterator<Item = &Fabric> {
    inventory.fabrics.iter().filter(|f| is_low_stock(f))
}

pub fn total_used(inventory: &Inventory) -> f64 {
    inventory.production_records.iter().map(ProductionRecord::fabric_used).sum()
}

/// Newest production runs first.
pub fn recent_production(inventory: &Inventory) -> Vec<&ProductionRecord> {
    inventory
        .production_records
        .iter()
        .rev()
        .take(RECENT_PRODUCTION_LIMIT)
        .collect()
}

/// Consumption grouped by the fabric code frozen on each record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricUsage {
    pub fabric_code: String,
    /// `code - material` when the fabric still exists, else the bare code.
    pub label: String,
    pub total_used: f64,
    pub total_value: f64,
    pub production_count: usize,
}

impl FabricUsage {
    pub fn average_per_run(&self) -> f64 {
        if self.production_count == 0 {
            0.0
        } else {
            self.total_used / self.production_count as f64
        }
    }
}

/// Usage per fabric, in order of first appearance in the production log.
pub fn usage_by_fabric(inventory: &Inventory) -> Vec<FabricUsage> {
    let mut stats: Vec<FabricUsage> = vec![];
    for record in &inventory.production_records {
        let code = &record.snapshot.fabric_code;
        let index = match stats.iter().position(|s| &s.fabric_code == code) {
            Some(index) => index,
            None => {
                let label = inventory
                    .fabric_by_code(code)
                    .map_or_else(|| code.clone(), |f| format!("{} - {}", f.code, f.material));
                stats.push(FabricUsage {
                    fabric_code: code.clone(),
                    label,
                    total_used: 0.0,
                    total_value: 0.0,
                    production_count: 0,
                });
                stats.len() - 1
            }
        };
        let entry = &mut stats[index];
        entry.total_used += record.fabric_used();
        entry.total_value += record.fabric_value();
        entry.production_count += 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ConsumptionSnapshot, EntityId};
    use chrono::NaiveDate;

    fn fabric(code: &str, length: f64, price: f64) -> Fabric {
        Fabric {
            id: EntityId(1),
            code: code.to_string(),
            material: "Satin".to_string(),
            color: String::new(),
            width: String::new(),
            current_length: length,
            price,
        }
    }

    fn record(id: i64, fabric_code: &str, used: f64, value: f64) -> ProductionRecord {
        ProductionRecord {
            id: EntityId(id),
            date: NaiveDate::from_ymd_opt(2024, 1, 1),
            product_code: "P".to_string(),
            quantity: 1,
            snapshot: ConsumptionSnapshot {
                product_name: "P".to_string(),
                fabric_code: fabric_code.to_string(),
                fabric_used: used,
                fabric_value: value,
            },
            notes: String::new(),
        }
    }

    #[test]
    fn test_summary() {
        let inventory = Inventory {
            fabrics: vec![fabric("A", 200.0, 10.0), fabric("B", 149.9, 2.0), fabric("C", 150.0, 1.0)],
            products: vec![],
            production_records: vec![record(1, "A", 1.1, 0.0), record(2, "A", 2.2, 0.0)],
        };
        let summary = Summary::of(&inventory);

        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.total_value, 2000.0 + 299.8 + 150.0);
        assert_eq!(summary.low_stock, 1);
        assert_eq!(summary.rounded().total_used, 3.3);
    }

    #[test]
    fn test_empty_summary() {
        let summary = Summary::of(&Inventory::new());
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.total_value, 0.0);
        assert_eq!(summary.low_stock, 0);
        assert_eq!(summary.total_used, 0.0);
    }

    #[test]
    fn test_usage_by_fabric_groups_and_labels() {
        let inventory = Inventory {
            fabrics: vec![fabric("A", 10.0, 1.0)],
            products: vec![],
            production_records: vec![
                record(1, "A", 4.0, 40.0),
                record(2, "GONE", 1.0, 5.0),
                record(3, "A", 2.0, 20.0),
            ],
        };
        let stats = usage_by_fabric(&inventory);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].label, "A - Satin");
        assert_eq!(stats[0].total_used, 6.0);
        assert_eq!(stats[0].total_value, 60.0);
        assert_eq!(stats[0].production_count, 2);
        assert_eq!(stats[0].average_per_run(), 3.0);
        assert_eq!(stats[1].label, "GONE");
    }

    #[test]
    fn test_recent_production_newest_first() {
        let inventory = Inventory {
            fabrics: vec![],
            products: vec![],
            production_records: (1..=7).map(|i| record(i, "A", 1.0, 0.0)).collect(),
        };
        let ids: Vec<_> = recent_production(&inventory).iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![7, 6, 5, 4, 3]);
    }
}
