//! FabricWorks Core - Fabric Stock & Production Tracking
//!
//! # Ground Rules
//! 1. Production Moves Stock (every create, edit and delete goes through the engine)
//! 2. Records Are Frozen (a production record keeps its consumption snapshot)
//! 3. Creation Never Overdraws
//! 4. Aggregates Are Derived, Never Stored
//! 5. Destructive Actions Are Confirmed

pub mod entities;
pub mod inventory;
pub mod engine;
pub mod aggregates;
pub mod validation;
pub mod export;
pub mod import;
pub mod snapshot;
pub mod report;
pub mod ports;
pub mod config;
pub mod logging;
pub mod workshop;

pub use entities::{
    Collection, ConsumptionSnapshot, EntityId, Fabric, Product, ProductionRecord, ProductionRequest,
};
pub use inventory::{IdGenerator, Inventory};
pub use engine::{EngineError, StockMovement, Transition};
pub use aggregates::{Summary, LOW_STOCK_THRESHOLD};
pub use validation::{FabricForm, ProductForm, ProductionForm, ValidationError, ValidationViolation, ViolationSeverity};
pub use snapshot::{Backup, RestoreError, Snapshot};
pub use ports::{BackupSink, FlagStore, Prompt};
pub use config::Settings;
pub use workshop::{Outcome, Workshop, WorkshopError, BACKUP_REMINDER_INTERVAL};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
