//! In-process registry of migration units
//!
//! Units written in Rust register a constructor under their id. The registry
//! keeps registration order for `list_candidates`; the engine sorts anyway.

use async_trait::async_trait;
use std::sync::Arc;

use super::ScriptRepository;
use crate::error::{MigrationError, MigrationResult};
use crate::ids::{MigrationId, SCRIPT_EXTENSION};
use crate::unit::MigrationUnit;

type UnitFactory = Arc<dyn Fn() -> Box<dyn MigrationUnit> + Send + Sync>;

pub struct Registry {
    extension: String,
    units: Vec<(MigrationId, UnitFactory)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_extension(SCRIPT_EXTENSION)
    }

    /// Registry whose ids carry `extension` instead of `sql`
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            units: Vec::new(),
        }
    }

    /// Register a constructor under `id`. The id is normalized like user
    /// input; registering the same id again replaces the earlier constructor.
    pub fn register<F>(&mut self, id: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn MigrationUnit> + Send + Sync + 'static,
    {
        let id = MigrationId::normalize(id, &self.extension);
        let factory: UnitFactory = Arc::new(factory);

        match self.units.iter_mut().find(|(existing, _)| existing == &id) {
            Some(slot) => {
                tracing::debug!("Replacing registered migration {}", id);
                slot.1 = factory;
            }
            None => self.units.push((id, factory)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptRepository for Registry {
    fn extension(&self) -> &str {
        &self.extension
    }

    async fn list_candidates(&self) -> MigrationResult<Vec<MigrationId>> {
        Ok(self.units.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn contains(&self, id: &MigrationId) -> MigrationResult<bool> {
        Ok(self.units.iter().any(|(existing, _)| existing == id))
    }

    async fn load(&self, id: &MigrationId) -> MigrationResult<Box<dyn MigrationUnit>> {
        self.units
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, factory)| factory())
            .ok_or_else(|| MigrationError::not_found(id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::SqlScript;

    fn script(up: &str) -> impl Fn() -> Box<dyn MigrationUnit> + Send + Sync + 'static {
        let up = up.to_string();
        move || {
            Box::new(SqlScript {
                up_sql: up.clone(),
                down_sql: String::new(),
            }) as Box<dyn MigrationUnit>
        }
    }

    #[tokio::test]
    async fn test_registration_order_and_normalization() {
        let mut registry = Registry::new();
        registry
            .register("20240102000000_B", script("SELECT 2"))
            .register(" 20240101000000_a.sql ", script("SELECT 1"));

        let ids = registry.list_candidates().await.unwrap();
        assert_eq!(
            ids,
            vec![
                MigrationId::new("20240102000000_b.sql"),
                MigrationId::new("20240101000000_a.sql"),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_replaces() {
        let mut registry = Registry::new();
        registry
            .register("20240101000000_a", script("SELECT 1"))
            .register("20240101000000_a", script("SELECT 2"));

        assert_eq!(registry.len(), 1);
        assert!(registry
            .contains(&MigrationId::new("20240101000000_a.sql"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_load_unknown_id_is_not_found() {
        let registry = Registry::new();
        let err = registry
            .load(&MigrationId::new("20240101000000_a.sql"))
            .await
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }
}
