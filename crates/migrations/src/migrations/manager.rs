//! Migration Manager - File system operations for migrations
//!
//! Creates new migration scripts from a template in the script folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::clock::{Clock, SystemClock};
use crate::error::MigrationResult;
use crate::ids::{MigrationId, SCRIPT_EXTENSION};

/// Migration manager for creating migration scripts
pub struct MigrationManager {
    script_folder: PathBuf,
    clock: Arc<dyn Clock>,
}

impl MigrationManager {
    pub fn new(script_folder: impl Into<PathBuf>) -> Self {
        Self {
            script_folder: script_folder.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn script_folder(&self) -> &Path {
        &self.script_folder
    }

    /// Create a new migration file and return its path. Never overwrites an
    /// existing script.
    pub async fn create_migration(&self, name: &str) -> MigrationResult<PathBuf> {
        let created_at = self.clock.now();
        let migration_id = MigrationId::for_new_script(created_at, name, SCRIPT_EXTENSION)?;

        tokio::fs::create_dir_all(&self.script_folder).await?;

        let path = self.script_folder.join(migration_id.as_str());
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(self.create_migration_template(name, &created_at.to_rfc3339()).as_bytes())
            .await?;
        file.flush().await?;

        tracing::info!("Created migration {}", path.display());
        Ok(path)
    }

    /// Create migration template content
    fn create_migration_template(&self, name: &str, created_at: &str) -> String {
        format!(
            "-- Migration: {}\n\
             -- Created: {}\n\
             \n\
             -- Up migration\n\
             \n\
             \n\
             -- Down migration\n\
             \n",
            name.trim(),
            created_at
        )
    }
}
