mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use tidemark_core::{init_logging, ConfigOverrides, LogMode, LoggingConfig, MigrateConfig};
use tidemark_migrations::{Migrator, PgSession};

#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(about = "Apply, roll back and inspect PostgreSQL schema migrations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Target database, overriding DB_NAME
    #[arg(long, global = true)]
    database: Option<String>,

    /// Full connection string, replacing DB_SERVER, DB_PORT, DB_USER and DB_PWD
    #[arg(long, global = true)]
    connection_string: Option<String>,

    /// Migrations root folder, overriding MIGRATIONS_FOLDER
    #[arg(long, global = true)]
    migrations_folder: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    silent: bool,

    /// Log executed SQL and connection details
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply all pending migrations as one batch
    Migrate,

    /// Create a new migration script
    Add {
        /// Migration name, e.g. "add users table"
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Roll back one migration (by file name) or one batch (by batch id)
    Rollback {
        /// Migration file name or batch id
        target: String,
    },

    /// Roll back a migration or batch and everything applied after it
    #[command(name = "rollback-to", alias = "rollbackto")]
    RollbackTo {
        /// Migration file name or batch id
        target: String,
    },

    /// Show the migration log summary and the last batch
    Info,

    /// List every migration with its pending, applied or orphaned state
    Status,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database: self.database.clone(),
            connection_string: self.connection_string.clone(),
            migrations_folder: self.migrations_folder.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mode = LogMode::from_switches(cli.silent, cli.verbose);
    init_logging(LoggingConfig::for_mode(mode)).map_err(anyhow::Error::msg)?;

    let config = MigrateConfig::from_env(cli.overrides()).context("Invalid configuration")?;
    tracing::debug!(
        "Using database {} and migrations folder {}",
        config.db_name,
        config.migrations_folder().display()
    );

    let session = Arc::new(PgSession::from_config(&config)?);
    let migrator = Migrator::postgres(&config, session.clone());

    let result = match cli.command {
        Commands::Migrate => commands::migrate::run(&migrator).await,
        Commands::Add { name } => commands::add::run(&config, &name.join(" ")).await,
        Commands::Rollback { target } => commands::rollback::run(&migrator, &target).await,
        Commands::RollbackTo { target } => commands::rollback::run_to(&migrator, &target).await,
        Commands::Info => commands::info::run(&migrator, &config, cli.verbose).await,
        Commands::Status => commands::status::run(&migrator).await,
    };

    session.close().await;
    result
}
