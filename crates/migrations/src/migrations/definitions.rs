//! Migration Definitions - Result and status types reported by the engine

use chrono::{DateTime, Utc};

use crate::ids::{BatchId, MigrationId};
use crate::ledger::LedgerEntry;

/// Result of running migrations
#[derive(Debug, Clone)]
pub struct MigrationRunResult {
    /// Batch id assigned to this run
    pub batch_id: BatchId,
    /// Migrations applied, in execution order
    pub applied: Vec<MigrationId>,
    /// Number of candidates skipped because the ledger already has them
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Default)]
pub struct RollbackResult {
    /// Migrations whose rollback action ran
    pub rolled_back: Vec<MigrationId>,
    /// Ledger entries removed without a rollback because the unit is gone
    pub deregistered: Vec<MigrationId>,
    /// Requested migrations that no longer exist
    pub not_found: Vec<MigrationId>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl RollbackResult {
    /// True when nothing was rolled back or removed
    pub fn is_empty(&self) -> bool {
        self.rolled_back.is_empty() && self.deregistered.is_empty()
    }
}

/// Summary of the ledger
#[derive(Debug, Clone)]
pub struct LedgerInfo {
    /// Total number of ledger entries
    pub count: u64,
    /// Entries of the last batch, newest migration first
    pub last_batch: Vec<LedgerEntry>,
}

impl LedgerInfo {
    pub fn last_batch_id(&self) -> Option<&BatchId> {
        self.last_batch.first().map(|entry| &entry.batch_id)
    }

    /// Last executed migration of the last batch
    pub fn last_entry(&self) -> Option<&LedgerEntry> {
        self.last_batch.first()
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Available but not applied
    Pending,
    /// Applied and still available
    Applied {
        batch_id: BatchId,
        date_finished: DateTime<Utc>,
    },
    /// In the ledger, but the unit no longer exists
    Orphaned { batch_id: BatchId },
}

impl MigrationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Applied { .. } => "applied",
            MigrationStatus::Orphaned { .. } => "orphaned",
        }
    }
}

/// One line of a status listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub migration_id: MigrationId,
    pub status: MigrationStatus,
}
