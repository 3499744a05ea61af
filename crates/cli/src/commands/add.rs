use console::style;

use tidemark_core::MigrateConfig;
use tidemark_migrations::MigrationManager;

pub async fn run(config: &MigrateConfig, name: &str) -> anyhow::Result<()> {
    let manager = MigrationManager::new(config.script_folder());
    let path = manager.create_migration(name).await?;

    println!("{} Created migration: {}", style("✓").green(), path.display());
    Ok(())
}
