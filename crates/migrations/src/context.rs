//! Execution context handed to migration units
//!
//! Units never see the connection directly. They get a [`MigrationContext`]
//! that runs SQL text through the session and resolves the script folder
//! conventions (`sqlscript/<name>.sql`, `schema/<kind>/<name>.sql`).

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tidemark_core::MigrateConfig;

use crate::error::{MigrationError, MigrationResult};

/// Runs raw SQL text against the target database
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute_sql(&self, sql: &str) -> MigrationResult<()>;
}

/// Kinds of database objects with per-object schema scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaObjectKind {
    Table,
    View,
    Function,
    Procedure,
    Trigger,
}

impl SchemaObjectKind {
    pub fn folder_name(&self) -> &'static str {
        match self {
            SchemaObjectKind::Table => "table",
            SchemaObjectKind::View => "view",
            SchemaObjectKind::Function => "function",
            SchemaObjectKind::Procedure => "procedure",
            SchemaObjectKind::Trigger => "trigger",
        }
    }
}

impl fmt::Display for SchemaObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Folder layout below the migrations root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPaths {
    pub sql_script_folder: PathBuf,
    pub schema_folder: PathBuf,
}

impl ScriptPaths {
    /// Layout rooted at `root`
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            sql_script_folder: root.join("sqlscript"),
            schema_folder: root.join("schema"),
        }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self {
            sql_script_folder: config.sql_script_folder(),
            schema_folder: config.schema_folder(),
        }
    }
}

/// SQL helper passed to `execute` and `rollback`
#[derive(Clone)]
pub struct MigrationContext {
    executor: Arc<dyn SqlExecutor>,
    paths: ScriptPaths,
    database_name: String,
}

impl MigrationContext {
    pub fn new(executor: Arc<dyn SqlExecutor>, paths: ScriptPaths, database_name: impl Into<String>) -> Self {
        Self {
            executor,
            paths,
            database_name: database_name.into(),
        }
    }

    /// Name of the target database
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn paths(&self) -> &ScriptPaths {
        &self.paths
    }

    /// Run SQL text. Blank text is skipped.
    pub async fn query(&self, sql: &str) -> MigrationResult<()> {
        if sql.trim().is_empty() {
            return Ok(());
        }

        tracing::debug!("{}", sql);
        self.executor.execute_sql(sql).await
    }

    /// Run the contents of a SQL file
    pub async fn file(&self, path: impl AsRef<Path>) -> MigrationResult<()> {
        let path = path.as_ref();
        let sql = match tokio::fs::read_to_string(path).await {
            Ok(sql) => sql,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MigrationError::InvalidScript {
                    path: path.to_path_buf(),
                    message: "can't execute the SQL query from file because no file was found".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Executing {}", path.display());
        self.query(&sql).await
    }

    /// Run `sqlscript/<name>.sql`
    pub async fn sql_script(&self, name: &str) -> MigrationResult<()> {
        let path = self.paths.sql_script_folder.join(format!("{}.sql", name));
        self.file(path).await
    }

    /// Run `schema/<kind>/<name>.sql`, e.g. the current definition of a view
    pub async fn schema_script(&self, kind: SchemaObjectKind, name: &str) -> MigrationResult<()> {
        let path = self
            .paths
            .schema_folder
            .join(kind.folder_name())
            .join(format!("{}.sql", name));
        self.file(path).await
    }
}
