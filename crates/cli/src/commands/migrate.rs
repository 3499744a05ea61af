use console::style;

use tidemark_migrations::Migrator;

pub async fn run(migrator: &Migrator) -> anyhow::Result<()> {
    let result = migrator.migrate().await?;

    if result.applied.is_empty() {
        println!("{} Database is up to date", style("✓").green());
        return Ok(());
    }

    println!(
        "{} Applied {} migration(s) in batch {} ({} ms)",
        style("✓").green(),
        result.applied_count(),
        style(&result.batch_id).cyan(),
        result.execution_time_ms
    );
    for migration_id in &result.applied {
        println!("  {}", migration_id);
    }
    Ok(())
}
