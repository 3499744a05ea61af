//! In-process ledger
//!
//! Keeps entries in a map guarded by an async mutex. Used for dry runs and
//! as the reference implementation the engine tests run against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{LedgerEntry, LedgerStore};
use crate::clock::{Clock, SystemClock};
use crate::error::MigrationResult;
use crate::ids::{BatchId, MigrationId};

pub struct MemoryLedger {
    entries: Mutex<BTreeMap<MigrationId, LedgerEntry>>,
    table_created: Mutex<bool>,
    clock: Arc<dyn Clock>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use `clock` for the finish time of registered entries
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            table_created: Mutex::new(false),
            clock,
        }
    }

    /// Insert an entry as-is, bypassing registration
    pub async fn seed(&self, entry: LedgerEntry) {
        self.entries
            .lock()
            .await
            .insert(entry.migration_id.clone(), entry);
    }

    /// Whether `ensure_table_exists` has been called
    pub async fn table_created(&self) -> bool {
        *self.table_created.lock().await
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    entries.sort_by(|a, b| b.migration_id.cmp(&a.migration_id));
    entries
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn ensure_table_exists(&self) -> MigrationResult<()> {
        let mut created = self.table_created.lock().await;
        if !*created {
            tracing::info!("Creating migration history table");
            *created = true;
        }
        Ok(())
    }

    async fn exists(&self, migration_id: &MigrationId) -> MigrationResult<bool> {
        Ok(self.entries.lock().await.contains_key(migration_id))
    }

    async fn register(
        &self,
        migration_id: &MigrationId,
        batch_id: &BatchId,
        date_started: DateTime<Utc>,
    ) -> MigrationResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(migration_id) {
            return Ok(());
        }

        entries.insert(
            migration_id.clone(),
            LedgerEntry {
                migration_id: migration_id.clone(),
                batch_id: batch_id.clone(),
                date_started,
                date_finished: self.clock.now(),
            },
        );
        Ok(())
    }

    async fn deregister(&self, migration_id: &MigrationId) -> MigrationResult<()> {
        self.entries.lock().await.remove(migration_id);
        Ok(())
    }

    async fn entries_by_batch(&self, batch_id: &BatchId) -> MigrationResult<Vec<LedgerEntry>> {
        let entries = self.entries.lock().await;
        Ok(newest_first(
            entries
                .values()
                .filter(|entry| &entry.batch_id == batch_id)
                .cloned()
                .collect(),
        ))
    }

    async fn batches_from(&self, batch_id: &BatchId) -> MigrationResult<Vec<BatchId>> {
        let entries = self.entries.lock().await;

        let mut earliest: BTreeMap<&BatchId, DateTime<Utc>> = BTreeMap::new();
        for entry in entries.values() {
            earliest
                .entry(&entry.batch_id)
                .and_modify(|start| *start = (*start).min(entry.date_started))
                .or_insert(entry.date_started);
        }

        let Some(threshold) = earliest.get(batch_id).copied() else {
            return Ok(Vec::new());
        };

        // BTreeMap iterates ascending; reverse for newest batch id first
        Ok(earliest
            .into_iter()
            .rev()
            .filter(|(_, start)| *start >= threshold)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn entries_from(&self, migration_id: &MigrationId) -> MigrationResult<Vec<LedgerEntry>> {
        let entries = self.entries.lock().await;
        let Some(threshold) = entries.get(migration_id).map(|entry| entry.date_started) else {
            return Ok(Vec::new());
        };

        Ok(newest_first(
            entries
                .values()
                .filter(|entry| entry.date_started >= threshold)
                .cloned()
                .collect(),
        ))
    }

    async fn count(&self) -> MigrationResult<u64> {
        Ok(self.entries.lock().await.len() as u64)
    }

    async fn last_batch(&self) -> MigrationResult<Vec<LedgerEntry>> {
        let entries = self.entries.lock().await;
        let Some(last) = entries.values().next_back() else {
            return Ok(Vec::new());
        };

        let batch_id = last.batch_id.clone();
        Ok(newest_first(
            entries
                .values()
                .filter(|entry| entry.batch_id == batch_id)
                .cloned()
                .collect(),
        ))
    }

    async fn entries(&self) -> MigrationResult<Vec<LedgerEntry>> {
        Ok(self.entries.lock().await.values().cloned().collect())
    }
}
