//! Database session
//!
//! One connection to the target database, opened on first use and shared by
//! the ledger and by the SQL that migration units run. The owner closes it
//! exactly once when the command finishes, whatever the outcome.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Executor;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;

use tidemark_core::MigrateConfig;

use crate::context::SqlExecutor;
use crate::error::{MigrationError, MigrationResult};

/// Pause between connection attempts
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Lazily connected, single-connection database session
pub struct PgSession {
    options: PgConnectOptions,
    attempts: u32,
    pool: OnceCell<PgPool>,
}

impl PgSession {
    pub fn new(options: PgConnectOptions, attempts: u32) -> Self {
        Self {
            options,
            attempts: attempts.max(1),
            pool: OnceCell::new(),
        }
    }

    /// Session against the configured target database
    pub fn from_config(config: &MigrateConfig) -> MigrationResult<Self> {
        let options = connect_options(config, config.db_name.as_str())?;
        Ok(Self::new(options, config.connection_retry))
    }

    /// The connection pool, connecting on first call
    pub async fn pool(&self) -> MigrationResult<&PgPool> {
        self.pool
            .get_or_try_init(|| connect_with_retry(&self.options, self.attempts))
            .await
    }

    /// Whether a connection has been opened
    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }

    /// Close the connection if one was opened
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            tracing::debug!("Database connection closed");
        }
    }
}

#[async_trait]
impl SqlExecutor for PgSession {
    async fn execute_sql(&self, sql: &str) -> MigrationResult<()> {
        let pool = self.pool().await?;
        // No bound arguments: runs over the simple query protocol, so one
        // script may hold several statements.
        pool.execute(sql).await?;
        Ok(())
    }
}

/// Connection options for `database` built from the configuration
pub fn connect_options(config: &MigrateConfig, database: &str) -> MigrationResult<PgConnectOptions> {
    let options = match &config.connection_string {
        Some(url) => PgConnectOptions::from_str(url)
            .map_err(|e| MigrationError::connection(format!("Invalid connection string: {}", e)))?,
        None => {
            let mut options = PgConnectOptions::new();
            if let Some(host) = &config.db_server {
                options = options.host(host);
            }
            if let Some(port) = config.db_port {
                options = options.port(port);
            }
            if let Some(user) = &config.db_user {
                options = options.username(user);
            }
            if let Some(password) = &config.db_password {
                options = options.password(password);
            }
            options
        }
    };

    Ok(options
        .database(database)
        .application_name(&config.app_name))
}

/// Open a one-connection pool, trying up to `attempts` times
pub(crate) async fn connect_with_retry(options: &PgConnectOptions, attempts: u32) -> MigrationResult<PgPool> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
        {
            Ok(pool) => {
                tracing::debug!("Connected to database (attempt {}/{})", attempt, attempts);
                return Ok(pool);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "Connection attempt {}/{} failed: {}",
                    attempt,
                    attempts,
                    e
                );
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(MigrationError::connection(format!(
                    "Failed to connect to database after {} attempt(s): {}",
                    attempts, e
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::ConfigOverrides;

    fn config(pairs: &[(&str, &str)], overrides: ConfigOverrides) -> MigrateConfig {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MigrateConfig::from_lookup(
            |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()),
            overrides,
        )
        .unwrap()
    }

    #[test]
    fn test_options_from_settings() {
        let config = config(
            &[
                ("DB_SERVER", "db.internal"),
                ("DB_PORT", "6543"),
                ("DB_NAME", "sales"),
                ("DB_USER", "admin"),
                ("DB_PWD", "secret"),
            ],
            ConfigOverrides::default(),
        );

        let options = connect_options(&config, "postgres").unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "admin");
        assert_eq!(options.get_database(), Some("postgres"));
    }

    #[test]
    fn test_options_from_connection_string() {
        let config = config(
            &[("DB_NAME", "sales")],
            ConfigOverrides {
                connection_string: Some("postgres://u:p@remote:5433/ignored".to_string()),
                ..Default::default()
            },
        );

        let options = connect_options(&config, "sales").unwrap();
        assert_eq!(options.get_host(), "remote");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("sales"));
    }

    #[test]
    fn test_invalid_connection_string() {
        let config = config(
            &[("DB_NAME", "sales")],
            ConfigOverrides {
                connection_string: Some("not a connection url".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(
            connect_options(&config, "sales"),
            Err(MigrationError::Connection { .. })
        ));
    }

    #[tokio::test]
    async fn test_session_is_lazy() {
        let config = config(
            &[
                ("DB_SERVER", "localhost"),
                ("DB_PORT", "5432"),
                ("DB_NAME", "sales"),
                ("DB_USER", "admin"),
                ("DB_PWD", "secret"),
            ],
            ConfigOverrides::default(),
        );

        let session = PgSession::from_config(&config).unwrap();
        assert!(!session.is_connected());
        // closing an unopened session does nothing
        session.close().await;
        assert!(!session.is_connected());
    }
}
