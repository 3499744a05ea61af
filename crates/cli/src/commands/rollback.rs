use console::style;

use tidemark_migrations::{MigrationRollback, Migrator, RollbackResult};

pub async fn run(migrator: &Migrator, target: &str) -> anyhow::Result<()> {
    let result = migrator.rollback(target).await?;
    report(&result);
    Ok(())
}

pub async fn run_to(migrator: &Migrator, target: &str) -> anyhow::Result<()> {
    let result = migrator.rollback_to(target).await?;
    report(&result);
    Ok(())
}

fn report(result: &RollbackResult) {
    for migration_id in &result.not_found {
        println!("{} Migration {} was not found", style("!").yellow(), migration_id);
    }

    if result.is_empty() {
        println!("Nothing was rolled back");
        return;
    }

    println!(
        "{} Rolled back {} migration(s) ({} ms)",
        style("✓").green(),
        result.rolled_back.len(),
        result.execution_time_ms
    );
    for migration_id in &result.rolled_back {
        println!("  {}", migration_id);
    }
    for migration_id in &result.deregistered {
        println!("  {} (removed from log, file missing)", style(migration_id).dim());
    }
}
