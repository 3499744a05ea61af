//! # tidemark-migrations: Migration Ledger and Batch Engine
//!
//! Applies hand-authored migration units to a PostgreSQL database, records
//! each success in a ledger table, and rolls units back by migration id or by
//! batch, singly or down to a reference point.
//!
//! The engine works against traits: [`LedgerStore`] for the ledger,
//! [`ScriptRepository`] for the units and [`SqlExecutor`] for the SQL the
//! units run. The PostgreSQL implementations share one lazily opened
//! [`PgSession`].

pub mod clock;
pub mod context;
pub mod database;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod migrations;
pub mod repository;
pub mod session;
pub mod unit;

// Re-export core traits and types
pub use clock::{Clock, SystemClock};
pub use context::{MigrationContext, SchemaObjectKind, ScriptPaths, SqlExecutor};
pub use database::{DatabaseProvisioner, PostgresProvisioner};
pub use error::{Direction, MigrationError, MigrationResult};
pub use ids::{BatchId, MigrationId, RollbackTarget, SCRIPT_EXTENSION};
pub use ledger::{LedgerEntry, LedgerStore, MemoryLedger, PostgresLedger};
pub use migrations::*;
pub use repository::{DirectoryRepository, Registry, ScriptRepository};
pub use session::PgSession;
pub use unit::{MigrationUnit, SqlScript};
