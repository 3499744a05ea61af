//! Migration engine
//!
//! - `runner`: forward migration, pending discovery, info and status
//! - `rollback`: rollback and rollback-to by migration id or batch id
//! - `manager`: scaffolding of new migration scripts
//! - `definitions`: result and status types

pub mod definitions;
pub mod manager;
pub mod rollback;
pub mod runner;

pub use definitions::{LedgerInfo, MigrationRunResult, MigrationStatus, RollbackResult, StatusEntry};
pub use manager::MigrationManager;
pub use rollback::MigrationRollback;
pub use runner::Migrator;
