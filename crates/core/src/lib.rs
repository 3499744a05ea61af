//! # tidemark-core
//!
//! Shared foundation for the tidemark migration tool: environment-driven
//! configuration, identifier validation for SQL object names, and
//! tracing subscriber setup.

pub mod config;
pub mod logging;

pub use config::{
    ConfigError, ConfigOverrides, ConfigResult, ConfigSource, ConfigValidator, Identifier,
    IdentifierValidator, MigrateConfig, PortValidator, TableName,
};
pub use logging::{init_logging, LogMode, LoggingConfig};

/// Tool name, used as the default application name reported to the database
pub const TOOL_NAME: &str = "tidemark";
