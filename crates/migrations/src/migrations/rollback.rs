//! Migration Rollback - Handles rolling back applied migrations
//!
//! A rollback target is either one migration or one batch. `rollback` undoes
//! just that target; `rollback_to` undoes it and everything started after it,
//! newest first. A unit that no longer exists is never fatal here: a single
//! migration is reported as not found, a batch member is dropped from the
//! ledger. A failing rollback action stops the command.

use async_trait::async_trait;
use std::time::Instant;

use super::definitions::RollbackResult;
use super::runner::Migrator;
use crate::error::{Direction, MigrationError, MigrationResult};
use crate::ids::{BatchId, MigrationId, RollbackTarget};

/// Extension trait for Migrator to add rollback functionality
#[async_trait]
pub trait MigrationRollback {
    /// Roll back one migration or one batch, dispatching on the input's shape
    async fn rollback(&self, input: &str) -> MigrationResult<RollbackResult>;

    /// Roll back a migration or batch and everything applied after it
    async fn rollback_to(&self, input: &str) -> MigrationResult<RollbackResult>;

    /// Roll back a specific migration by id
    async fn rollback_migration(&self, migration_id: &MigrationId) -> MigrationResult<RollbackResult>;

    /// Roll back all migrations in a specific batch, newest first
    async fn rollback_batch(&self, batch_id: &BatchId) -> MigrationResult<RollbackResult>;
}

impl Migrator {
    fn parse_target(&self, input: &str) -> MigrationResult<RollbackTarget> {
        RollbackTarget::parse(input, self.repository().extension())
    }

    async fn undo_migration(
        &self,
        migration_id: &MigrationId,
        result: &mut RollbackResult,
    ) -> MigrationResult<()> {
        let unit = match self.repository().load(migration_id).await {
            Ok(unit) => unit,
            Err(e) if e.is_not_found() => {
                tracing::warn!("Migration {} was not found", migration_id);
                result.not_found.push(migration_id.clone());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::info!("Rolling back migration {}", migration_id);
        unit.rollback(self.context())
            .await
            .map_err(|e| MigrationError::execution(migration_id.as_str(), Direction::Down, e))?;

        if self.ledger().exists(migration_id).await? {
            self.ledger().deregister(migration_id).await?;
        } else {
            tracing::debug!("Migration {} had no migration log entry", migration_id);
        }

        result.rolled_back.push(migration_id.clone());
        Ok(())
    }

    async fn undo_batch(&self, batch_id: &BatchId, result: &mut RollbackResult) -> MigrationResult<()> {
        let entries = self.ledger().entries_by_batch(batch_id).await?;
        if entries.is_empty() {
            tracing::warn!("Batch {} has no migration log entries", batch_id);
            return Ok(());
        }

        for entry in entries {
            let migration_id = entry.migration_id;
            match self.repository().load(&migration_id).await {
                Ok(unit) => {
                    tracing::info!("[{}] Rolling back migration {}", batch_id, migration_id);
                    unit.rollback(self.context()).await.map_err(|e| {
                        MigrationError::execution(migration_id.as_str(), Direction::Down, e)
                    })?;
                    self.ledger().deregister(&migration_id).await?;
                    result.rolled_back.push(migration_id);
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        "[{}] Migration {} was not found, removing it from the migration log",
                        batch_id,
                        migration_id
                    );
                    self.ledger().deregister(&migration_id).await?;
                    result.deregistered.push(migration_id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MigrationRollback for Migrator {
    async fn rollback(&self, input: &str) -> MigrationResult<RollbackResult> {
        match self.parse_target(input)? {
            RollbackTarget::Migration(migration_id) => self.rollback_migration(&migration_id).await,
            RollbackTarget::Batch(batch_id) => self.rollback_batch(&batch_id).await,
        }
    }

    async fn rollback_to(&self, input: &str) -> MigrationResult<RollbackResult> {
        let target = self.parse_target(input)?;
        let start_time = Instant::now();
        self.ledger().ensure_table_exists().await?;

        let mut result = RollbackResult::default();
        match target {
            RollbackTarget::Migration(migration_id) => {
                let entries = self.ledger().entries_from(&migration_id).await?;
                if entries.is_empty() {
                    tracing::warn!("Migration {} is not in the migration log", migration_id);
                }
                for entry in entries {
                    self.undo_migration(&entry.migration_id, &mut result).await?;
                }
            }
            RollbackTarget::Batch(batch_id) => {
                let batches = self.ledger().batches_from(&batch_id).await?;
                if batches.is_empty() {
                    tracing::warn!("Batch {} is not in the migration log", batch_id);
                }
                for batch in batches {
                    self.undo_batch(&batch, &mut result).await?;
                }
            }
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }

    async fn rollback_migration(&self, migration_id: &MigrationId) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();
        self.ledger().ensure_table_exists().await?;

        let mut result = RollbackResult::default();
        self.undo_migration(migration_id, &mut result).await?;

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }

    async fn rollback_batch(&self, batch_id: &BatchId) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();
        self.ledger().ensure_table_exists().await?;

        let mut result = RollbackResult::default();
        self.undo_batch(batch_id, &mut result).await?;

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }
}
