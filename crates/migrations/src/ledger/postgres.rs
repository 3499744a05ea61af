//! PostgreSQL ledger
//!
//! Stores one row per applied migration in the configured history table.
//! Statement text lives in [`LedgerSql`]; values are always bound, the table
//! name is interpolated only after it passed identifier validation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::sync::Arc;

use tidemark_core::TableName;

use super::{LedgerEntry, LedgerStore};
use crate::clock::{Clock, SystemClock};
use crate::error::MigrationResult;
use crate::ids::{BatchId, MigrationId};
use crate::session::PgSession;

const COLUMNS: &str = "migration, batchid, datestarted, datefinished";

/// Byte order for migration ids, independent of the database locale
const BY_MIGRATION: &str = "migration COLLATE \"C\"";

/// SQL text for the ledger table
#[derive(Debug, Clone)]
pub struct LedgerSql {
    table: TableName,
}

impl LedgerSql {
    pub fn new(table: TableName) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Bind: schema (NULL for the current schema), table name; both folded to lower case
    pub fn table_exists(&self) -> &'static str {
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
         WHERE table_schema = COALESCE($1::text, current_schema()) AND table_name = $2::text)"
    }

    pub fn create_table(&self) -> String {
        format!(
            "CREATE TABLE {} (\n    \
                migration VARCHAR(1000) NOT NULL PRIMARY KEY,\n    \
                batchid VARCHAR(50) NOT NULL,\n    \
                datestarted TIMESTAMPTZ NOT NULL,\n    \
                datefinished TIMESTAMPTZ NOT NULL\n\
            )",
            self.table
        )
    }

    /// Bind: migration
    pub fn exists(&self) -> String {
        format!("SELECT 1 FROM {} WHERE migration = $1", self.table)
    }

    /// Bind: migration, batchid, datestarted, datefinished
    pub fn register(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4) ON CONFLICT (migration) DO NOTHING",
            self.table, COLUMNS
        )
    }

    /// Bind: migration
    pub fn deregister(&self) -> String {
        format!("DELETE FROM {} WHERE migration = $1", self.table)
    }

    /// Bind: batchid
    pub fn entries_by_batch(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE batchid = $1 ORDER BY {} DESC",
            COLUMNS, self.table, BY_MIGRATION
        )
    }

    /// Bind: batchid
    pub fn batches_from(&self) -> String {
        format!(
            "SELECT batchid FROM {table} GROUP BY batchid \
             HAVING MIN(datestarted) >= (SELECT MIN(datestarted) FROM {table} WHERE batchid = $1) \
             ORDER BY batchid DESC",
            table = self.table
        )
    }

    /// Bind: migration
    pub fn entries_from(&self) -> String {
        format!(
            "SELECT {columns} FROM {table} \
             WHERE datestarted >= (SELECT datestarted FROM {table} WHERE migration = $1) \
             ORDER BY {order} DESC",
            columns = COLUMNS,
            table = self.table,
            order = BY_MIGRATION
        )
    }

    pub fn count(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.table)
    }

    pub fn last_batch(&self) -> String {
        format!(
            "SELECT {columns} FROM {table} \
             WHERE batchid = (SELECT batchid FROM {table} ORDER BY {order} DESC LIMIT 1) \
             ORDER BY {order} DESC",
            columns = COLUMNS,
            table = self.table,
            order = BY_MIGRATION
        )
    }

    pub fn entries(&self) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY {} ASC",
            COLUMNS, self.table, BY_MIGRATION
        )
    }
}

/// Ledger stored in the target database, sharing the session with the units
pub struct PostgresLedger {
    session: Arc<PgSession>,
    sql: LedgerSql,
    clock: Arc<dyn Clock>,
}

impl PostgresLedger {
    pub fn new(session: Arc<PgSession>, table: TableName) -> Self {
        Self {
            session,
            sql: LedgerSql::new(table),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sql(&self) -> &LedgerSql {
        &self.sql
    }

    async fn fetch_entries(&self, sql: &str, key: &str) -> MigrationResult<Vec<LedgerEntry>> {
        let pool = self.session.pool().await?;
        let rows = sqlx::query(sql).bind(key).fetch_all(pool).await?;
        rows.iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: &PgRow) -> MigrationResult<LedgerEntry> {
    Ok(LedgerEntry {
        migration_id: MigrationId::new(row.try_get::<String, _>("migration")?),
        batch_id: BatchId::new(row.try_get::<String, _>("batchid")?),
        date_started: row.try_get("datestarted")?,
        date_finished: row.try_get("datefinished")?,
    })
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn ensure_table_exists(&self) -> MigrationResult<()> {
        let pool = self.session.pool().await?;

        let table = self.sql.table();
        let exists: bool = sqlx::query_scalar(self.sql.table_exists())
            .bind(table.schema().map(|schema| schema.as_str().to_lowercase()))
            .bind(table.name().as_str().to_lowercase())
            .fetch_one(pool)
            .await?;

        if !exists {
            tracing::info!("Creating migration history table {}", self.sql.table());
            sqlx::query(&self.sql.create_table()).execute(pool).await?;
        }

        Ok(())
    }

    async fn exists(&self, migration_id: &MigrationId) -> MigrationResult<bool> {
        let pool = self.session.pool().await?;
        let row = sqlx::query(&self.sql.exists())
            .bind(migration_id.as_str())
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    async fn register(
        &self,
        migration_id: &MigrationId,
        batch_id: &BatchId,
        date_started: DateTime<Utc>,
    ) -> MigrationResult<()> {
        let pool = self.session.pool().await?;
        sqlx::query(&self.sql.register())
            .bind(migration_id.as_str())
            .bind(batch_id.as_str())
            .bind(date_started)
            .bind(self.clock.now())
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn deregister(&self, migration_id: &MigrationId) -> MigrationResult<()> {
        let pool = self.session.pool().await?;
        sqlx::query(&self.sql.deregister())
            .bind(migration_id.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn entries_by_batch(&self, batch_id: &BatchId) -> MigrationResult<Vec<LedgerEntry>> {
        self.fetch_entries(&self.sql.entries_by_batch(), batch_id.as_str())
            .await
    }

    async fn batches_from(&self, batch_id: &BatchId) -> MigrationResult<Vec<BatchId>> {
        let pool = self.session.pool().await?;
        let batches: Vec<String> = sqlx::query_scalar(&self.sql.batches_from())
            .bind(batch_id.as_str())
            .fetch_all(pool)
            .await?;
        Ok(batches.into_iter().map(BatchId::new).collect())
    }

    async fn entries_from(&self, migration_id: &MigrationId) -> MigrationResult<Vec<LedgerEntry>> {
        self.fetch_entries(&self.sql.entries_from(), migration_id.as_str())
            .await
    }

    async fn count(&self) -> MigrationResult<u64> {
        let pool = self.session.pool().await?;
        let count: i64 = sqlx::query_scalar(&self.sql.count()).fetch_one(pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn last_batch(&self) -> MigrationResult<Vec<LedgerEntry>> {
        let pool = self.session.pool().await?;
        let rows = sqlx::query(&self.sql.last_batch()).fetch_all(pool).await?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn entries(&self) -> MigrationResult<Vec<LedgerEntry>> {
        let pool = self.session.pool().await?;
        let rows = sqlx::query(&self.sql.entries()).fetch_all(pool).await?;
        rows.iter().map(entry_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(table: &str) -> LedgerSql {
        LedgerSql::new(TableName::parse("DB_MIGRATION_TABLE", table).unwrap())
    }

    #[test]
    fn test_ledger_sql_generation() {
        let sql = sql("migration_log");

        let create = sql.create_table();
        assert!(create.starts_with("CREATE TABLE migration_log ("));
        assert!(create.contains("migration VARCHAR(1000) NOT NULL PRIMARY KEY"));
        assert!(create.contains("batchid VARCHAR(50) NOT NULL"));
        assert!(create.contains("datestarted TIMESTAMPTZ NOT NULL"));

        assert!(sql.table_exists().contains("COALESCE($1::text, current_schema())"));
        assert_eq!(sql.exists(), "SELECT 1 FROM migration_log WHERE migration = $1");
        assert_eq!(
            sql.register(),
            "INSERT INTO migration_log (migration, batchid, datestarted, datefinished) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (migration) DO NOTHING"
        );
        assert_eq!(sql.deregister(), "DELETE FROM migration_log WHERE migration = $1");
        assert_eq!(sql.count(), "SELECT COUNT(*) FROM migration_log");
    }

    #[test]
    fn test_range_queries_order_newest_first() {
        let sql = sql("migration_log");

        assert!(sql
            .entries_by_batch()
            .ends_with("WHERE batchid = $1 ORDER BY migration COLLATE \"C\" DESC"));

        let batches = sql.batches_from();
        assert!(batches.contains("GROUP BY batchid"));
        assert!(batches.contains("HAVING MIN(datestarted) >= (SELECT MIN(datestarted) FROM migration_log WHERE batchid = $1)"));
        assert!(batches.ends_with("ORDER BY batchid DESC"));

        let entries = sql.entries_from();
        assert!(entries.contains("WHERE datestarted >= (SELECT datestarted FROM migration_log WHERE migration = $1)"));
        assert!(entries.ends_with("ORDER BY migration COLLATE \"C\" DESC"));

        let last = sql.last_batch();
        assert!(last.contains(
            "(SELECT batchid FROM migration_log ORDER BY migration COLLATE \"C\" DESC LIMIT 1)"
        ));
        assert!(last.ends_with("ORDER BY migration COLLATE \"C\" DESC"));
        assert!(sql.entries().ends_with("ORDER BY migration COLLATE \"C\" ASC"));
    }

    #[test]
    fn test_schema_qualified_table() {
        let sql = sql("audit.migration_log");
        assert!(sql.create_table().starts_with("CREATE TABLE audit.migration_log ("));
        assert_eq!(sql.deregister(), "DELETE FROM audit.migration_log WHERE migration = $1");
    }
}
