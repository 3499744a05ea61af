//! Migration scripts stored as SQL files in one folder

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::ScriptRepository;
use crate::error::{MigrationError, MigrationResult};
use crate::ids::{MigrationId, SCRIPT_EXTENSION};
use crate::unit::{MigrationUnit, SqlScript};

pub struct DirectoryRepository {
    folder: PathBuf,
}

impl DirectoryRepository {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn path_of(&self, id: &MigrationId) -> PathBuf {
        self.folder.join(id.as_str())
    }

    fn is_script(path: &Path) -> bool {
        path.extension()
            .map_or(false, |ext| ext == SCRIPT_EXTENSION)
    }
}

#[async_trait]
impl ScriptRepository for DirectoryRepository {
    fn extension(&self) -> &str {
        SCRIPT_EXTENSION
    }

    async fn list_candidates(&self) -> MigrationResult<Vec<MigrationId>> {
        let mut entries = match tokio::fs::read_dir(&self.folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Migration folder {} does not exist", self.folder.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() || !Self::is_script(&path) {
                continue;
            }

            match entry.file_name().to_str() {
                Some(name) => ids.push(MigrationId::new(name)),
                None => tracing::warn!("Skipping migration file with non UTF-8 name: {}", path.display()),
            }
        }

        Ok(ids)
    }

    async fn contains(&self, id: &MigrationId) -> MigrationResult<bool> {
        match tokio::fs::metadata(self.path_of(id)).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, id: &MigrationId) -> MigrationResult<Box<dyn MigrationUnit>> {
        if !self.contains(id).await? {
            return Err(MigrationError::not_found(id.as_str()));
        }

        let script = SqlScript::load(&self.path_of(id)).await?;
        Ok(Box::new(script))
    }
}
