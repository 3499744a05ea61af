//! Error types for the migration engine
//!
//! Four fault families matter to callers: configuration faults and
//! connectivity faults are fatal before any migration runs, a missing
//! migration unit is recoverable in rollback paths, and an execution fault
//! stops the current run without touching the failed unit's ledger entry.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use tidemark_core::ConfigError;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Which action of a migration unit was running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The forward action (`execute`)
    Up,
    /// The reverse action (`rollback`)
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("execute"),
            Direction::Down => f.write_str("rollback"),
        }
    }
}

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {id} was not found")]
    NotFound { id: String },

    #[error("Migration {id} failed during {direction}: {source}")]
    Execution {
        id: String,
        direction: Direction,
        #[source]
        source: Box<MigrationError>,
    },

    #[error("Invalid migration script {}: {message}", path.display())]
    InvalidScript { path: PathBuf, message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Free-form failure raised by a migration unit's own logic
    #[error("{0}")]
    Custom(String),
}

impl MigrationError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn execution(id: impl Into<String>, direction: Direction, source: MigrationError) -> Self {
        Self::Execution {
            id: id.into(),
            direction,
            source: Box::new(source),
        }
    }

    /// True for faults the rollback paths may log and step over
    pub fn is_not_found(&self) -> bool {
        matches!(self, MigrationError::NotFound { .. })
    }
}
