//! Workshop - Single Entry Point
//!
//! Every user action goes through here. Production changes always run the
//! consumption engine; there is no path that writes a production record or
//! moves stock around it.

use chrono::{Local, Utc};
use std::path::PathBuf;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregates::Summary;
use crate::config::{ConfigError, Settings};
use crate::engine::{self, EngineError, Transition};
use crate::entities::{Collection, EntityId, Fabric, Product};
use crate::export::{self, ExportError, ExportText};
use crate::import::{self, ImportError, ImportSchema};
use crate::inventory::{IdGenerator, Inventory};
use crate::ports::{BackupSink, PortError, Prompt};
use crate::report;
use crate::snapshot::{self, RestoreError, Snapshot};
use crate::validation::{FabricForm, ProductForm, ProductionForm, ValidationError, ValidationViolation};

/// A backup is offered each time the total record count reaches a multiple
/// of this.
pub const BACKUP_REMINDER_INTERVAL: usize = 5;

#[derive(Debug, Error)]
pub enum WorkshopError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Fabric not found: {0}")]
    UnknownFabric(EntityId),

    #[error("Product not found: {0}")]
    UnknownProduct(EntityId),

    #[error("There are no products to delete")]
    NothingToDelete,
}

/// Result of an operation behind a confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Declined,
}

pub fn backup_due(total_records: usize) -> bool {
    total_records > 0 && total_records % BACKUP_REMINDER_INTERVAL == 0
}

pub struct Workshop<P, S> {
    inventory: Inventory,
    ids: IdGenerator,
    prompt: P,
    backups: S,
    delimiter: u8,
    fabric_columns: ImportSchema,
    product_columns: ImportSchema,
}

impl<P: Prompt, S: BackupSink> Workshop<P, S> {
    pub fn new(prompt: P, backups: S) -> Self {
        Self {
            inventory: Inventory::new(),
            ids: IdGenerator::new(),
            prompt,
            backups,
            delimiter: b',',
            fabric_columns: ImportSchema::fabrics(),
            product_columns: ImportSchema::products(),
        }
    }

    pub fn with_settings(settings: &Settings, prompt: P, backups: S) -> Result<Self, ConfigError> {
        let mut workshop = Self::new(prompt, backups);
        workshop.delimiter = settings.delimiter_byte()?;
        workshop.fabric_columns = settings.fabric_columns.clone();
        workshop.product_columns = settings.product_columns.clone();
        Ok(workshop)
    }

    /// Seed the sample catalog, only when nothing is loaded.
    pub fn load_samples(&mut self) -> bool {
        if !self.inventory.is_empty() {
            return false;
        }
        self.inventory = Inventory::sample(&mut self.ids);
        debug!(records = self.inventory.total_records(), "Sample catalog loaded");
        true
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    pub fn prompt_mut(&mut self) -> &mut P {
        &mut self.prompt
    }

    pub fn backups(&self) -> &S {
        &self.backups
    }

    pub fn summary(&self) -> Summary {
        Summary::of(&self.inventory)
    }

    // --- Fabrics ---

    pub fn add_fabric(&mut self, form: &FabricForm) -> Result<EntityId, WorkshopError> {
        let checked = form.check()?;
        self.surface(&checked.warnings);

        let id = self.ids.next_id();
        info!(%id, code = %checked.value.code, "Fabric added");
        self.inventory.insert_fabric(Fabric::from_draft(id, checked.value));
        self.remind_backup();
        Ok(id)
    }

    /// Direct edit: every field is overwritten and stock is not validated.
    pub fn edit_fabric(&mut self, id: EntityId, form: &FabricForm) -> Result<(), WorkshopError> {
        let checked = form.check()?;
        self.surface(&checked.warnings);

        let length = checked.value.current_length;
        if !self.inventory.replace_fabric(id, checked.value) {
            return Err(WorkshopError::UnknownFabric(id));
        }
        info!(%id, current_length = length, "Fabric edited");
        Ok(())
    }

    pub fn duplicate_fabric(&mut self, id: EntityId) -> Result<EntityId, WorkshopError> {
        let source = self.inventory.fabric(id).ok_or(WorkshopError::UnknownFabric(id))?;
        let copy = Fabric {
            id: self.ids.next_id(),
            code: format!("{}_COPY", source.code),
            ..source.clone()
        };
        self.prompt.notify(&format!("Copied fabric {} to {}", source.code, copy.code));
        let new_id = copy.id;
        self.inventory.insert_fabric(copy);
        Ok(new_id)
    }

    /// Removes the fabric even if products still point at its code.
    pub fn delete_fabric(&mut self, id: EntityId) -> Result<Outcome, WorkshopError> {
        let fabric = self.inventory.fabric(id).ok_or(WorkshopError::UnknownFabric(id))?;
        if !self.prompt.confirm(&format!("Delete fabric {}?", fabric.code)) {
            return Ok(Outcome::Declined);
        }
        if let Some(removed) = self.inventory.remove_fabric(id) {
            info!(%id, code = %removed.code, "Fabric deleted");
        }
        Ok(Outcome::Applied)
    }

    // --- Products ---

    pub fn add_product(&mut self, form: &ProductForm) -> Result<EntityId, WorkshopError> {
        let checked = form.check()?;
        self.surface(&checked.warnings);

        let id = self.ids.next_id();
        info!(%id, code = %checked.value.code, fabric = %checked.value.fabric_code, "Product added");
        self.inventory.insert_product(Product::from_draft(id, checked.value));
        self.remind_backup();
        Ok(id)
    }

    /// Existing production records keep their frozen snapshot values.
    pub fn edit_product(&mut self, id: EntityId, form: &ProductForm) -> Result<(), WorkshopError> {
        let checked = form.check()?;
        self.surface(&checked.warnings);

        if !self.inventory.replace_product(id, checked.value) {
            return Err(WorkshopError::UnknownProduct(id));
        }
        info!(%id, "Product edited");
        Ok(())
    }

    pub fn duplicate_product(&mut self, id: EntityId) -> Result<EntityId, WorkshopError> {
        let source = self.inventory.product(id).ok_or(WorkshopError::UnknownProduct(id))?;
        let copy = Product {
            id: self.ids.next_id(),
            code: format!("{}_COPY", source.code),
            name: format!("{} (copy)", source.name),
            ..source.clone()
        };
        self.prompt.notify(&format!("Copied product {} to {}", source.code, copy.code));
        let new_id = copy.id;
        self.inventory.insert_product(copy);
        Ok(new_id)
    }

    pub fn delete_product(&mut self, id: EntityId) -> Result<Outcome, WorkshopError> {
        let product = self.inventory.product(id).ok_or(WorkshopError::UnknownProduct(id))?;
        if !self.prompt.confirm(&format!("Delete product {}?", product.code)) {
            return Ok(Outcome::Declined);
        }
        if let Some(removed) = self.inventory.remove_product(id) {
            info!(%id, code = %removed.code, "Product deleted");
        }
        Ok(Outcome::Applied)
    }

    pub fn delete_all_products(&mut self) -> Result<Outcome, WorkshopError> {
        let count = self.inventory.products.len();
        if count == 0 {
            return Err(WorkshopError::NothingToDelete);
        }
        let message = format!(
            "WARNING: delete all {count} products? This cannot be undone. Make sure you have a backup."
        );
        if !self.prompt.confirm(&message) {
            return Ok(Outcome::Declined);
        }
        let removed = self.inventory.clear_products();
        info!(removed, "All products deleted");
        self.prompt.notify(&format!("Deleted {removed} products"));
        Ok(Outcome::Applied)
    }

    // --- Production ---

    /// Log a production run, debiting its fabric. Rejected without any change
    /// when stock does not cover the requirement.
    pub fn create_production(&mut self, form: &ProductionForm) -> Result<EntityId, WorkshopError> {
        let request = form.check()?.value;
        let id = self.ids.next_id();

        let transition = engine::apply_create(&self.inventory, id, &request).map_err(|e| {
            warn!(product = %request.product_code, quantity = request.quantity, error = %e, "Production rejected");
            e
        })?;
        self.commit("Production created", transition);
        self.remind_backup();
        Ok(id)
    }

    /// Rewrite a production run via reversal and reapplication. Stock may go
    /// negative; that is logged, not rejected.
    pub fn edit_production(&mut self, id: EntityId, form: &ProductionForm) -> Result<(), WorkshopError> {
        let request = form.check()?.value;
        let transition = engine::apply_edit(&self.inventory, id, &request)?;
        for movement in transition.overdrawn() {
            warn!(
                fabric = %movement.fabric_code,
                length = movement.length_after,
                "Production edit left fabric stock negative"
            );
        }
        self.commit("Production edited", transition);
        Ok(())
    }

    /// Delete a production run and return its fabric to stock.
    pub fn delete_production(&mut self, id: EntityId) -> Result<Outcome, WorkshopError> {
        let record = self
            .inventory
            .record(id)
            .ok_or(EngineError::UnknownRecord(id))?;
        let message = format!(
            "Delete the production of {} x{}? Its fabric will be returned to stock.",
            record.snapshot.product_name, record.quantity
        );
        if !self.prompt.confirm(&message) {
            return Ok(Outcome::Declined);
        }

        let transition = engine::apply_delete(&self.inventory, id)?;
        if transition.movements.is_empty() {
            warn!(%id, "Product or fabric no longer exists; no stock returned");
        }
        self.commit("Production deleted", transition);
        Ok(Outcome::Applied)
    }

    fn commit(&mut self, action: &str, transition: Transition) {
        for movement in &transition.movements {
            debug!(
                fabric = %movement.fabric_code,
                delta = movement.delta,
                length_after = movement.length_after,
                "Stock moved"
            );
        }
        info!(id = %transition.record_id, movements = transition.movements.len(), "{action}");
        self.inventory = transition.inventory;
    }

    // --- Import / Export ---

    pub fn export(&mut self, collection: Collection) -> Result<ExportText, WorkshopError> {
        let text = export::export_collection(&self.inventory, collection, self.delimiter)?;
        if text.sample {
            self.prompt.notify(&format!(
                "No {collection} yet; exported a sample row showing the import format"
            ));
        }
        Ok(text)
    }

    /// Parse delimited text and, once confirmed, append every row. Nothing is
    /// appended if any row is rejected. Numeric cells are lenient, so a blank
    /// fabric usage imports as 0 with a notice.
    pub fn import(&mut self, collection: Collection, text: &str) -> Result<(Outcome, usize), WorkshopError> {
        let (fabrics, products) = match collection {
            Collection::Fabrics => (
                import::parse_fabrics(text, &self.fabric_columns, self.delimiter, &mut self.ids)?,
                vec![],
            ),
            Collection::Products => (
                vec![],
                import::parse_products(text, &self.product_columns, self.delimiter, &mut self.ids)?,
            ),
            Collection::Production => return Err(ImportError::Unsupported(collection).into()),
        };

        let unusable = products.iter().filter(|p| p.fabric_usage <= 0.0).count();
        if unusable > 0 {
            warn!(unusable, "Imported products without a positive fabric usage");
            self.prompt.notify(&format!(
                "{unusable} product(s) have no positive fabric usage; producing them uses no fabric"
            ));
        }

        let count = fabrics.len() + products.len();
        if !self.prompt.confirm(&format!("Found {count} valid {collection}. Append them?")) {
            return Ok((Outcome::Declined, count));
        }
        self.inventory.fabrics.extend(fabrics);
        self.inventory.products.extend(products);
        info!(%collection, count, "Imported rows");
        self.prompt.notify(&format!("Imported {count} {collection}"));
        Ok((Outcome::Applied, count))
    }

    // --- Backup / Restore / Report ---

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.inventory, Utc::now())
    }

    pub fn backup(&mut self) -> Result<PathBuf, WorkshopError> {
        let snapshot = self.snapshot();
        let path = self.backups.store(&snapshot)?;
        info!(path = %path.display(), records = self.inventory.total_records(), "Backup written");
        Ok(path)
    }

    /// Replace all three collections with the backup's. A malformed backup
    /// is rejected before the user is asked anything.
    pub fn restore(&mut self, text: &str) -> Result<Outcome, WorkshopError> {
        let backup = snapshot::parse_backup(text)?;
        if !self.prompt.confirm(&backup.describe()) {
            return Ok(Outcome::Declined);
        }
        self.ids = IdGenerator::after(&backup.inventory);
        self.inventory = backup.inventory;
        info!(records = self.inventory.total_records(), "Backup restored");
        self.prompt.notify("Backup restored");
        Ok(Outcome::Applied)
    }

    pub fn report(&self) -> String {
        report::render(&self.inventory, Local::now())
    }

    fn remind_backup(&mut self) {
        let total = self.inventory.total_records();
        if !backup_due(total) {
            return;
        }
        if !self.prompt.offer_backup(total) {
            debug!(total, "Backup reminder dismissed");
            return;
        }
        if let Err(e) = self.backup() {
            warn!(error = %e, "Backup after reminder failed");
            self.prompt.notify(&format!("Backup failed: {e}"));
        }
    }

    fn surface(&mut self, warnings: &[ValidationViolation]) {
        for warning in warnings {
            warn!(field = %warning.field, "{}", warning.message);
            self.prompt.notify(&format!("{}: {}", warning.field, warning.message));
        }
    }
}
