//! Migration units
//!
//! A unit is one hand-authored schema change with a forward action and a
//! reverse action. The engine only ever invokes those two actions.

use async_trait::async_trait;
use std::path::Path;

use crate::context::MigrationContext;
use crate::error::MigrationResult;

/// A named, immutable schema change
#[async_trait]
pub trait MigrationUnit: Send + Sync {
    /// Apply the change
    async fn execute(&self, ctx: &MigrationContext) -> MigrationResult<()>;

    /// Undo the change
    async fn rollback(&self, ctx: &MigrationContext) -> MigrationResult<()>;
}

/// A unit backed by a SQL script with `-- up` and `-- down` sections
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlScript {
    pub up_sql: String,
    pub down_sql: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

impl Section {
    fn from_marker(comment: &str) -> Option<Self> {
        let body = comment.trim().trim_end_matches(':').trim_end().to_lowercase();
        match body.as_str() {
            "up" | "up migration" => Some(Section::Up),
            "down" | "down migration" => Some(Section::Down),
            _ => None,
        }
    }
}

impl SqlScript {
    /// Split script content into its up and down sections.
    ///
    /// A section starts at a comment line whose whole body is `up` / `down`
    /// (optionally followed by `:`) or `up migration` / `down migration`.
    /// Text before the first marker and other comment lines are dropped.
    pub fn parse(content: &str) -> Self {
        let mut up_sql = Vec::new();
        let mut down_sql = Vec::new();
        let mut section = Section::Preamble;

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(comment) = trimmed.strip_prefix("--") {
                if let Some(marker) = Section::from_marker(comment) {
                    section = marker;
                }
                continue;
            }

            match section {
                Section::Up => up_sql.push(line),
                Section::Down => down_sql.push(line),
                Section::Preamble => {}
            }
        }

        Self {
            up_sql: up_sql.join("\n").trim().to_string(),
            down_sql: down_sql.join("\n").trim().to_string(),
        }
    }

    /// Read and parse a script file
    pub async fn load(path: &Path) -> MigrationResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&content))
    }
}

#[async_trait]
impl MigrationUnit for SqlScript {
    async fn execute(&self, ctx: &MigrationContext) -> MigrationResult<()> {
        ctx.query(&self.up_sql).await
    }

    async fn rollback(&self, ctx: &MigrationContext) -> MigrationResult<()> {
        ctx.query(&self.down_sql).await
    }
}
