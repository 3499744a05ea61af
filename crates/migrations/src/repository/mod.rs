//! Script Repository
//!
//! Where migration units come from. The engine asks a repository for the
//! candidate ids and loads units one at a time; it never resolves code from
//! strings itself.

use async_trait::async_trait;

use crate::error::MigrationResult;
use crate::ids::MigrationId;
use crate::unit::MigrationUnit;

pub mod directory;
pub mod registry;

pub use directory::DirectoryRepository;
pub use registry::Registry;

#[async_trait]
pub trait ScriptRepository: Send + Sync {
    /// Extension that user-supplied ids are normalized to
    fn extension(&self) -> &str;

    /// Ids of every available unit, in the repository's natural order.
    /// Callers must not rely on that order being sorted.
    async fn list_candidates(&self) -> MigrationResult<Vec<MigrationId>>;

    async fn contains(&self, id: &MigrationId) -> MigrationResult<bool>;

    /// Load a unit; `NotFound` when no unit has this id
    async fn load(&self, id: &MigrationId) -> MigrationResult<Box<dyn MigrationUnit>>;
}
