//! Logging setup
//!
//! Progress lines from the migration engine are emitted through `tracing`.
//! The command line picks a [`LogMode`], which becomes the default filter;
//! `RUST_LOG` still wins when it is set.

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    /// Progress lines and errors
    #[default]
    Normal,
    /// Warnings and errors only
    Silent,
    /// Everything, including executed SQL text
    Verbose,
}

impl LogMode {
    /// Resolve the `--silent`/`--verbose` switches; verbose wins when both are given
    pub fn from_switches(silent: bool, verbose: bool) -> Self {
        match (silent, verbose) {
            (_, true) => LogMode::Verbose,
            (true, false) => LogMode::Silent,
            (false, false) => LogMode::Normal,
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            LogMode::Normal => "info",
            LogMode::Silent => "warn",
            LogMode::Verbose => "debug",
        }
    }
}

/// Logging configuration for the command line tool
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Include the target module in each line
    pub include_target: bool,
    /// Include timestamp in logs
    pub include_timestamp: bool,
    /// Environment filter (supports complex filters like "tidemark=debug,sqlx=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::for_mode(LogMode::Normal)
    }
}

impl LoggingConfig {
    /// Plain progress output, the way an operator reads it in a terminal
    pub fn for_mode(mode: LogMode) -> Self {
        let level = mode.level();
        Self {
            level: level.to_string(),
            include_target: mode == LogMode::Verbose,
            include_timestamp: mode == LogMode::Verbose,
            env_filter: Some(format!("{level},sqlx=warn")),
        }
    }

    /// Set environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn filter_directive(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

/// Initialize the global tracing subscriber
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.filter_directive()))?;

    let layer = Layer::new()
        .with_writer(io::stderr)
        .with_target(config.include_target);

    if config.include_timestamp {
        tracing_subscriber::registry().with(filter).with(layer).try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.without_time())
            .try_init()?;
    }

    tracing::debug!(
        target: "tidemark::logging",
        "Logging initialized (filter: {})",
        config.filter_directive()
    );

    Ok(())
}
