//! Migration Ledger
//!
//! The ledger is the single source of truth for "has this change been
//! applied". One row per applied migration: created when the unit's forward
//! action has returned successfully, deleted when it is rolled back, never
//! updated in between.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MigrationResult;
use crate::ids::{BatchId, MigrationId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::{LedgerSql, PostgresLedger};

/// One applied migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub migration_id: MigrationId,
    pub batch_id: BatchId,
    pub date_started: DateTime<Utc>,
    pub date_finished: DateTime<Utc>,
}

/// Durable, queryable record of applied migrations.
///
/// Implementations propagate query and connection failures unchanged and
/// never retry.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the ledger table when it does not exist yet
    async fn ensure_table_exists(&self) -> MigrationResult<()>;

    async fn exists(&self, migration_id: &MigrationId) -> MigrationResult<bool>;

    /// Record a successful forward action; `date_finished` is the time of
    /// registration. Registering an id twice leaves the first entry in place.
    async fn register(
        &self,
        migration_id: &MigrationId,
        batch_id: &BatchId,
        date_started: DateTime<Utc>,
    ) -> MigrationResult<()>;

    /// Remove an entry; absent ids are ignored
    async fn deregister(&self, migration_id: &MigrationId) -> MigrationResult<()>;

    /// Entries of one batch, newest migration id first
    async fn entries_by_batch(&self, batch_id: &BatchId) -> MigrationResult<Vec<LedgerEntry>>;

    /// Batch ids whose earliest start is at or after the earliest start of
    /// `batch_id`, newest batch id first. Unknown batches yield nothing.
    async fn batches_from(&self, batch_id: &BatchId) -> MigrationResult<Vec<BatchId>>;

    /// Entries started at or after `migration_id` started, newest migration
    /// id first. Unknown migrations yield nothing.
    async fn entries_from(&self, migration_id: &MigrationId) -> MigrationResult<Vec<LedgerEntry>>;

    async fn count(&self) -> MigrationResult<u64>;

    /// Entries sharing the batch of the greatest migration id, newest first
    async fn last_batch(&self) -> MigrationResult<Vec<LedgerEntry>>;

    /// Every entry, oldest migration id first
    async fn entries(&self) -> MigrationResult<Vec<LedgerEntry>>;
}
