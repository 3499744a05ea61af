//! Migration Runner - Executes migrations against the database
//!
//! Discovers pending units, applies them in ascending id order under one
//! batch id, and records each one in the ledger as soon as it succeeds. The
//! first failure stops the run; everything registered before it stays.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tidemark_core::MigrateConfig;

use super::definitions::{LedgerInfo, MigrationRunResult, MigrationStatus, StatusEntry};
use crate::clock::{Clock, SystemClock};
use crate::context::{MigrationContext, ScriptPaths};
use crate::database::{DatabaseProvisioner, PostgresProvisioner};
use crate::error::{Direction, MigrationError, MigrationResult};
use crate::ids::{BatchId, MigrationId};
use crate::ledger::{LedgerStore, PostgresLedger};
use crate::repository::{DirectoryRepository, ScriptRepository};
use crate::session::PgSession;

/// Migration engine tying a ledger, a unit repository and an execution context together
pub struct Migrator {
    ledger: Arc<dyn LedgerStore>,
    repository: Arc<dyn ScriptRepository>,
    context: MigrationContext,
    provisioner: Option<Arc<dyn DatabaseProvisioner>>,
    clock: Arc<dyn Clock>,
}

impl Migrator {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        repository: Arc<dyn ScriptRepository>,
        context: MigrationContext,
    ) -> Self {
        Self {
            ledger,
            repository,
            context,
            provisioner: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Check (and possibly create) the target database before migrating
    pub fn with_provisioner(mut self, provisioner: Arc<dyn DatabaseProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Engine over a PostgreSQL session: ledger in the configured table,
    /// scripts from the configured migration folder
    pub fn postgres(config: &MigrateConfig, session: Arc<PgSession>) -> Self {
        let ledger = PostgresLedger::new(session.clone(), config.migration_table.clone());
        let repository = DirectoryRepository::new(config.script_folder());
        let context = MigrationContext::new(
            session,
            ScriptPaths::from_config(config),
            config.db_name.as_str(),
        );

        Self::new(Arc::new(ledger), Arc::new(repository), context)
            .with_provisioner(Arc::new(PostgresProvisioner::new(config.clone())))
    }

    pub fn ledger(&self) -> &dyn LedgerStore {
        self.ledger.as_ref()
    }

    pub fn repository(&self) -> &dyn ScriptRepository {
        self.repository.as_ref()
    }

    pub fn context(&self) -> &MigrationContext {
        &self.context
    }

    /// Run all pending migrations
    pub async fn migrate(&self) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();

        if let Some(provisioner) = &self.provisioner {
            provisioner.ensure_database().await?;
        }
        self.ledger.ensure_table_exists().await?;

        let (pending, skipped_count) = self.discover().await?;
        let batch_id = BatchId::from_timestamp(self.clock.now());

        if pending.is_empty() {
            tracing::info!("No pending migrations");
            return Ok(MigrationRunResult {
                batch_id,
                applied: Vec::new(),
                skipped_count,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        tracing::info!("Starting migration batch with ID {}", batch_id);

        let mut applied = Vec::with_capacity(pending.len());
        for migration_id in pending {
            self.apply(&migration_id, &batch_id).await?;
            applied.push(migration_id);
        }

        tracing::info!("[{}] Processed {} migrations", batch_id, applied.len());

        Ok(MigrationRunResult {
            batch_id,
            applied,
            skipped_count,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Apply one unit and register it under `batch_id`
    async fn apply(&self, migration_id: &MigrationId, batch_id: &BatchId) -> MigrationResult<()> {
        let date_started = self.clock.now();
        tracing::info!("[{}] Running migration {}", batch_id, migration_id);

        let unit = self.repository.load(migration_id).await?;
        if let Err(e) = unit.execute(&self.context).await {
            tracing::error!("[{}] Migration {} failed: {}", batch_id, migration_id, e);
            return Err(MigrationError::execution(migration_id.as_str(), Direction::Up, e));
        }

        self.ledger
            .register(migration_id, batch_id, date_started)
            .await
    }

    /// Pending ids in execution order, and the number of candidates already applied
    async fn discover(&self) -> MigrationResult<(Vec<MigrationId>, usize)> {
        let candidates = self.repository.list_candidates().await?;

        let mut pending = Vec::new();
        let mut skipped_count = 0;
        for migration_id in candidates {
            if self.ledger.exists(&migration_id).await? {
                skipped_count += 1;
            } else {
                pending.push(migration_id);
            }
        }

        pending.sort();
        pending.dedup();
        Ok((pending, skipped_count))
    }

    /// Pending migrations in the order `migrate` would run them
    pub async fn pending(&self) -> MigrationResult<Vec<MigrationId>> {
        self.ledger.ensure_table_exists().await?;
        let (pending, _) = self.discover().await?;
        Ok(pending)
    }

    /// Ledger size and the last batch
    pub async fn info(&self) -> MigrationResult<LedgerInfo> {
        self.ledger.ensure_table_exists().await?;
        Ok(LedgerInfo {
            count: self.ledger.count().await?,
            last_batch: self.ledger.last_batch().await?,
        })
    }

    /// Status of every known migration, repository and ledger combined
    pub async fn status(&self) -> MigrationResult<Vec<StatusEntry>> {
        self.ledger.ensure_table_exists().await?;

        let available: HashSet<MigrationId> = self
            .repository
            .list_candidates()
            .await?
            .into_iter()
            .collect();

        let mut statuses: BTreeMap<MigrationId, MigrationStatus> = available
            .iter()
            .map(|id| (id.clone(), MigrationStatus::Pending))
            .collect();

        for entry in self.ledger.entries().await? {
            let status = if available.contains(&entry.migration_id) {
                MigrationStatus::Applied {
                    batch_id: entry.batch_id,
                    date_finished: entry.date_finished,
                }
            } else {
                MigrationStatus::Orphaned {
                    batch_id: entry.batch_id,
                }
            };
            statuses.insert(entry.migration_id, status);
        }

        Ok(statuses
            .into_iter()
            .map(|(migration_id, status)| StatusEntry {
                migration_id,
                status,
            })
            .collect())
    }
}
