//! Target database provisioning
//!
//! Before the first migration of a run, the target database must exist. The
//! check runs on its own short-lived connection to the server's maintenance
//! database, so the session used by the ledger never points at a database
//! that is not there yet.

use async_trait::async_trait;
use sqlx::PgPool;

use tidemark_core::{Identifier, MigrateConfig};

use crate::error::{MigrationError, MigrationResult};
use crate::session::{connect_options, connect_with_retry};

/// Database every PostgreSQL server has
const MAINTENANCE_DATABASE: &str = "postgres";

#[async_trait]
pub trait DatabaseProvisioner: Send + Sync {
    /// Make sure the target database exists, creating it when allowed
    async fn ensure_database(&self) -> MigrationResult<()>;
}

/// Provisioner for a PostgreSQL server
pub struct PostgresProvisioner {
    config: MigrateConfig,
}

impl PostgresProvisioner {
    pub fn new(config: MigrateConfig) -> Self {
        Self { config }
    }

    fn database(&self) -> &Identifier {
        &self.config.db_name
    }

    async fn provision(&self, pool: &PgPool) -> MigrationResult<()> {
        let found = sqlx::query(database_exists_sql())
            .bind(self.database().as_str())
            .fetch_optional(pool)
            .await?;

        if found.is_some() {
            return Ok(());
        }

        if !self.config.create_db_if_not_exists {
            return Err(MigrationError::connection(format!(
                "Database {} does not exist on {}",
                self.database(),
                self.server_label()
            )));
        }

        tracing::info!("Creating database {}", self.database());
        sqlx::query(&create_database_sql(self.database()))
            .execute(pool)
            .await?;
        Ok(())
    }

    fn server_label(&self) -> String {
        match (&self.config.db_server, self.config.db_port) {
            (Some(server), Some(port)) => format!("{}:{}", server, port),
            (Some(server), None) => server.clone(),
            _ => "the configured server".to_string(),
        }
    }
}

/// Bind: database name
pub fn database_exists_sql() -> &'static str {
    "SELECT datname FROM pg_database WHERE datistemplate = false AND datname = $1"
}

pub fn create_database_sql(database: &Identifier) -> String {
    format!("CREATE DATABASE {}", database.quoted())
}

#[async_trait]
impl DatabaseProvisioner for PostgresProvisioner {
    async fn ensure_database(&self) -> MigrationResult<()> {
        let options = connect_options(&self.config, MAINTENANCE_DATABASE)?;
        let pool = connect_with_retry(&options, self.config.connection_retry).await?;

        let result = self.provision(&pool).await;
        pool.close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_database_quotes_name() {
        let name = Identifier::parse("DB_NAME", "Sales_2024").unwrap();
        assert_eq!(create_database_sql(&name), "CREATE DATABASE \"Sales_2024\"");
    }

    #[test]
    fn test_database_lookup_skips_templates() {
        assert!(database_exists_sql().contains("datistemplate = false"));
        assert!(database_exists_sql().ends_with("datname = $1"));
    }
}
