//! Consumption Engine - the only code that moves fabric stock
//!
//! Every operation is a pure transition: it takes the current inventory and
//! returns the next one, or an error with the input left untouched.
//!
//! Stock rules:
//! - create checks sufficiency, then debits `usage x quantity`
//! - edit credits the old requirement back, then debits the new one, with no
//!   sufficiency check
//! - delete credits the record's frozen `fabric_used`
//!
//! Lengths are rounded to one decimal after every movement.

use serde::Serialize;
use thiserror::Error;

use crate::entities::{ConsumptionSnapshot, EntityId, Fabric, Product, ProductionRecord, ProductionRequest};
use crate::inventory::Inventory;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Unknown product code: {0}")]
    UnknownProduct(String),

    #[error("Production record not found: {0}")]
    UnknownRecord(EntityId),

    #[error("Quantity must be a positive whole number")]
    InvalidQuantity,

    #[error(
        "Insufficient stock for fabric '{fabric_code}': required {required}m, available {available}m, short {shortage:.1}m"
    )]
    InsufficientStock {
        fabric_code: String,
        required: f64,
        available: f64,
        shortage: f64,
    },
}

/// One fabric length change applied by a transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub fabric_code: String,
    /// Positive for a credit, negative for a debit.
    pub delta: f64,
    pub length_after: f64,
}

/// The inventory after a committed operation plus the stock it moved.
#[derive(Debug, Clone)]
pub struct Transition {
    pub inventory: Inventory,
    pub record_id: EntityId,
    pub movements: Vec<StockMovement>,
}

impl Transition {
    /// Fabrics this transition left below zero.
    pub fn overdrawn(&self) -> impl Iterator<Item = &StockMovement> {
        self.movements.iter().filter(|m| m.length_after < 0.0)
    }
}

/// Round a length to one decimal, halves away from zero.
pub fn round_length(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Meters of fabric needed to make `quantity` units of `product`.
pub fn fabric_requirement(product: &Product, quantity: u32) -> f64 {
    product.fabric_usage * f64::from(quantity)
}

/// Verify `fabric` covers `required`. A missing fabric has no stock.
pub fn check_sufficiency<'a>(
    fabric_code: &str,
    fabric: Option<&'a Fabric>,
    required: f64,
) -> Result<&'a Fabric, EngineError> {
    match fabric {
        Some(f) if f.current_length >= required => Ok(f),
        _ => {
            let available = fabric.map_or(0.0, |f| f.current_length);
            Err(EngineError::InsufficientStock {
                fabric_code: fabric_code.to_string(),
                required,
                available,
                shortage: required - available,
            })
        }
    }
}

fn capture(product: &Product, fabric: Option<&Fabric>, required: f64) -> ConsumptionSnapshot {
    ConsumptionSnapshot {
        product_name: product.name.clone(),
        fabric_code: product.fabric_code.clone(),
        fabric_used: round_length(required),
        fabric_value: required * fabric.map_or(0.0, |f| f.price),
    }
}

/// Log a new production run and debit its fabric.
pub fn apply_create(
    state: &Inventory,
    id: EntityId,
    request: &ProductionRequest,
) -> Result<Transition, EngineError> {
    if request.quantity == 0 {
        return Err(EngineError::InvalidQuantity);
    }
    let product = state
        .product_by_code(&request.product_code)
        .ok_or_else(|| EngineError::UnknownProduct(request.product_code.clone()))?;

    let required = fabric_requirement(product, request.quantity);
    let fabric = check_sufficiency(
        &product.fabric_code,
        state.fabric_by_code(&product.fabric_code),
        required,
    )?;
    let snapshot = capture(product, Some(fabric), required);

    let mut next = state.clone();
    let mut movements = vec![];
    if let Some(fabric) = next.fabric_by_code_mut(&product.fabric_code) {
        fabric.current_length = round_length(fabric.current_length - required);
        movements.push(StockMovement {
            fabric_code: fabric.code.clone(),
            delta: -required,
            length_after: fabric.current_length,
        });
    }

    next.production_records.push(ProductionRecord {
        id,
        date: Some(request.date),
        product_code: request.product_code.clone(),
        quantity: request.quantity,
        snapshot,
        notes: request.notes.clone(),
    });

    Ok(Transition { inventory: next, record_id: id, movements })
}

/// Rewrite a production run: restore the stock its original product and
/// quantity consumed, then debit the new requirement.
///
/// The reversal amount is recomputed from the old product's current usage,
/// not from the frozen `fabric_used`. No sufficiency check runs, so an edit
/// can leave a fabric negative.
pub fn apply_edit(
    state: &Inventory,
    id: EntityId,
    request: &ProductionRequest,
) -> Result<Transition, EngineError> {
    if request.quantity == 0 {
        return Err(EngineError::InvalidQuantity);
    }
    let old = state.record(id).ok_or(EngineError::UnknownRecord(id))?;
    let product = state
        .product_by_code(&request.product_code)
        .ok_or_else(|| EngineError::UnknownProduct(request.product_code.clone()))?;

    let required = fabric_requirement(product, request.quantity);
    let reversal = state
        .product_by_code(&old.product_code)
        .map(|old_product| (old_product.fabric_code.clone(), fabric_requirement(old_product, old.quantity)));

    let mut next = state.clone();
    let mut touched: Vec<(String, f64)> = vec![];

    if let Some((code, amount)) = &reversal {
        if let Some(fabric) = next.fabric_by_code_mut(code) {
            fabric.current_length += amount;
            touched.push((code.clone(), *amount));
        }
    }

    if let Some(fabric) = next.fabric_by_code_mut(&product.fabric_code) {
        fabric.current_length = round_length(fabric.current_length - required);
        touched.push((product.fabric_code.clone(), -required));
    }

    // A reversal onto a different fabric was credited unrounded above.
    if let Some((code, _)) = &reversal {
        if *code != product.fabric_code {
            if let Some(fabric) = next.fabric_by_code_mut(code) {
                fabric.current_length = round_length(fabric.current_length);
            }
        }
    }

    let snapshot = capture(product, next.fabric_by_code(&product.fabric_code), required);
    if let Some(record) = next.record_mut(id) {
        record.date = Some(request.date);
        record.product_code = request.product_code.clone();
        record.quantity = request.quantity;
        record.notes = request.notes.clone();
        record.snapshot = snapshot;
    }

    let movements = movements_for(&next, touched);
    Ok(Transition { inventory: next, record_id: id, movements })
}

/// Remove a production run and return its fabric to stock.
///
/// The credit goes to the fabric of the record's product as it is now. If the
/// product is gone the record is still removed, with no restock.
pub fn apply_delete(state: &Inventory, id: EntityId) -> Result<Transition, EngineError> {
    let record = state.record(id).ok_or(EngineError::UnknownRecord(id))?;

    let mut next = state.clone();
    let mut touched = vec![];
    if let Some(product) = state.product_by_code(&record.product_code) {
        if let Some(fabric) = next.fabric_by_code_mut(&product.fabric_code) {
            fabric.current_length = round_length(fabric.current_length + record.fabric_used());
            touched.push((product.fabric_code.clone(), record.fabric_used()));
        }
    }
    next.production_records.retain(|r| r.id != id);

    let movements = movements_for(&next, touched);
    Ok(Transition { inventory: next, record_id: id, movements })
}

/// One movement per fabric; a reversal and debit on the same fabric net out.
fn movements_for(state: &Inventory, touched: Vec<(String, f64)>) -> Vec<StockMovement> {
    let mut net: Vec<(String, f64)> = vec![];
    for (code, delta) in touched {
        match net.iter_mut().find(|(c, _)| *c == code) {
            Some((_, total)) => *total = round_length(*total + delta),
            None => net.push((code, delta)),
        }
    }
    net
        .into_iter()
        .map(|(fabric_code, delta)| {
            let length_after = state.fabric_by_code(&fabric_code).map_or(0.0, |f| f.current_length);
            StockMovement { fabric_code, delta, length_after }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fabric(id: i64, code: &str, length: f64, price: f64) -> Fabric {
        Fabric {
            id: EntityId(id),
            code: code.to_string(),
            material: "Cotton".to_string(),
            color: String::new(),
            width: String::new(),
            current_length: length,
            price,
        }
    }

    fn product(id: i64, code: &str, fabric_code: &str, usage: f64) -> Product {
        Product {
            id: EntityId(id),
            code: code.to_string(),
            name: format!("{code} name"),
            kind: String::new(),
            fabric_code: fabric_code.to_string(),
            fabric_usage: usage,
        }
    }

    fn request(product_code: &str, quantity: u32) -> ProductionRequest {
        ProductionRequest {
            date: NaiveDate::from_ymd_opt(2024, 8, 5).unwrap(),
            product_code: product_code.to_string(),
            quantity,
            notes: String::new(),
        }
    }

    fn workshop_state() -> Inventory {
        Inventory {
            fabrics: vec![fabric(1, "F1", 100.0, 2.0), fabric(2, "F2", 40.0, 3.0)],
            products: vec![product(10, "P1", "F1", 5.0), product(11, "P2", "F2", 1.2)],
            production_records: vec![],
        }
    }

    #[test]
    fn test_round_length() {
        assert_eq!(round_length(3.5999999999999996), 3.6);
        assert_eq!(round_length(0.25), 0.3);
        assert_eq!(round_length(-0.25), -0.3);
        assert_eq!(round_length(round_length(12.34)), round_length(12.34));
    }

    #[test]
    fn test_create_debits_stock() {
        let state = workshop_state();
        let t = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap();

        assert_eq!(t.inventory.fabric_by_code("F1").unwrap().current_length, 50.0);
        let record = t.inventory.record(EntityId(100)).unwrap();
        assert_eq!(record.fabric_used(), 50.0);
        assert_eq!(record.fabric_value(), 100.0);
        assert_eq!(record.snapshot.product_name, "P1 name");
        assert_eq!(record.snapshot.fabric_code, "F1");
        assert_eq!(t.movements.len(), 1);
        assert_eq!(t.movements[0].delta, -50.0);
    }

    #[test]
    fn test_create_rejects_insufficient_stock() {
        let state = workshop_state();
        let err = apply_create(&state, EntityId(100), &request("P1", 21)).unwrap_err();

        assert_eq!(
            err,
            EngineError::InsufficientStock {
                fabric_code: "F1".to_string(),
                required: 105.0,
                available: 100.0,
                shortage: 5.0,
            }
        );
        assert_eq!(state.fabric_by_code("F1").unwrap().current_length, 100.0);
        assert!(state.production_records.is_empty());
    }

    #[test]
    fn test_create_with_missing_fabric_has_no_stock() {
        let mut state = workshop_state();
        state.products.push(product(12, "P3", "GONE", 1.0));

        match apply_create(&state, EntityId(100), &request("P3", 1)) {
            Err(EngineError::InsufficientStock { available, shortage, .. }) => {
                assert_eq!(available, 0.0);
                assert_eq!(shortage, 1.0);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }

    #[test]
    fn test_create_unknown_product() {
        let state = workshop_state();
        let err = apply_create(&state, EntityId(100), &request("NOPE", 1)).unwrap_err();
        assert_eq!(err, EngineError::UnknownProduct("NOPE".to_string()));
    }

    #[test]
    fn test_create_exact_stock_is_allowed() {
        let state = workshop_state();
        let t = apply_create(&state, EntityId(100), &request("P1", 20)).unwrap();
        assert_eq!(t.inventory.fabric_by_code("F1").unwrap().current_length, 0.0);
    }

    #[test]
    fn test_fabric_used_is_rounded_value_is_not() {
        let state = workshop_state();
        let t = apply_create(&state, EntityId(100), &request("P2", 3)).unwrap();
        let record = t.inventory.record(EntityId(100)).unwrap();

        assert_eq!(record.fabric_used(), 3.6);
        assert_eq!(record.fabric_value(), 1.2 * 3.0 * 3.0);
        assert_eq!(t.inventory.fabric_by_code("F2").unwrap().current_length, 36.4);
    }

    #[test]
    fn test_edit_restores_then_reapplies() {
        let state = workshop_state();
        let created = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap();
        let edited = apply_edit(&created.inventory, EntityId(100), &request("P1", 4)).unwrap();

        assert_eq!(edited.inventory.fabric_by_code("F1").unwrap().current_length, 80.0);
        let record = edited.inventory.record(EntityId(100)).unwrap();
        assert_eq!(record.quantity, 4);
        assert_eq!(record.fabric_used(), 20.0);
        assert_eq!(edited.inventory.production_records.len(), 1);
    }

    #[test]
    fn test_edit_moves_consumption_between_fabrics() {
        let state = workshop_state();
        let created = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap();
        let edited = apply_edit(&created.inventory, EntityId(100), &request("P2", 5)).unwrap();

        assert_eq!(edited.inventory.fabric_by_code("F1").unwrap().current_length, 100.0);
        assert_eq!(edited.inventory.fabric_by_code("F2").unwrap().current_length, 34.0);
        let record = edited.inventory.record(EntityId(100)).unwrap();
        assert_eq!(record.snapshot.fabric_code, "F2");
        assert_eq!(record.snapshot.product_name, "P2 name");
    }

    #[test]
    fn test_edit_can_overdraw() {
        let state = workshop_state();
        let created = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap();
        let edited = apply_edit(&created.inventory, EntityId(100), &request("P1", 30)).unwrap();

        assert_eq!(edited.inventory.fabric_by_code("F1").unwrap().current_length, -50.0);
        assert_eq!(edited.overdrawn().count(), 1);
    }

    #[test]
    fn test_edit_same_fabric_is_one_net_movement() {
        let state = workshop_state();
        let created = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap();
        let edited = apply_edit(&created.inventory, EntityId(100), &request("P1", 4)).unwrap();

        assert_eq!(edited.movements.len(), 1);
        assert_eq!(edited.movements[0].fabric_code, "F1");
        assert_eq!(edited.movements[0].delta, 30.0);
        assert_eq!(edited.movements[0].length_after, 80.0);
    }

    #[test]
    fn test_edit_after_old_product_deleted_skips_reversal() {
        let state = workshop_state();
        let mut created = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap().inventory;
        created.products.retain(|p| p.code != "P1");

        let edited = apply_edit(&created, EntityId(100), &request("P2", 5)).unwrap();

        assert_eq!(edited.inventory.fabric_by_code("F1").unwrap().current_length, 50.0);
        assert_eq!(edited.inventory.fabric_by_code("F2").unwrap().current_length, 34.0);
        assert_eq!(edited.movements.len(), 1);
        assert_eq!(edited.inventory.record(EntityId(100)).unwrap().product_code, "P2");
    }

    #[test]
    fn test_edit_reversal_uses_live_usage() {
        let state = workshop_state();
        let mut created = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap().inventory;
        created.products[0].fabric_usage = 6.0;

        let edited = apply_edit(&created, EntityId(100), &request("P1", 10)).unwrap();
        // 50 + 60 restored, then 60 debited
        assert_eq!(edited.inventory.fabric_by_code("F1").unwrap().current_length, 50.0);
    }

    #[test]
    fn test_edit_unknown_record() {
        let state = workshop_state();
        let err = apply_edit(&state, EntityId(5), &request("P1", 1)).unwrap_err();
        assert_eq!(err, EngineError::UnknownRecord(EntityId(5)));
    }

    #[test]
    fn test_delete_restocks() {
        let state = workshop_state();
        let created = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap();
        let deleted = apply_delete(&created.inventory, EntityId(100)).unwrap();

        assert_eq!(deleted.inventory.fabric_by_code("F1").unwrap().current_length, 100.0);
        assert!(deleted.inventory.production_records.is_empty());
        assert_eq!(deleted.movements[0].delta, 50.0);
    }

    #[test]
    fn test_delete_without_product_skips_restock() {
        let state = workshop_state();
        let mut created = apply_create(&state, EntityId(100), &request("P1", 10)).unwrap().inventory;
        created.products.retain(|p| p.code != "P1");

        let deleted = apply_delete(&created, EntityId(100)).unwrap();
        assert_eq!(deleted.inventory.fabric_by_code("F1").unwrap().current_length, 50.0);
        assert!(deleted.inventory.production_records.is_empty());
        assert!(deleted.movements.is_empty());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let state = workshop_state();
        assert_eq!(
            apply_create(&state, EntityId(1), &request("P1", 0)).unwrap_err(),
            EngineError::InvalidQuantity
        );
    }
}
