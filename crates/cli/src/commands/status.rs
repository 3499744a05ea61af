use console::style;

use tidemark_migrations::{MigrationStatus, Migrator};

pub async fn run(migrator: &Migrator) -> anyhow::Result<()> {
    let statuses = migrator.status().await?;

    println!("{}", style("Migration status").bold());
    if statuses.is_empty() {
        println!("  No migrations found");
        return Ok(());
    }

    let mut pending = 0;
    for entry in &statuses {
        match &entry.status {
            MigrationStatus::Pending => {
                pending += 1;
                println!("  {} {}", style("pending ").yellow(), entry.migration_id);
            }
            MigrationStatus::Applied { batch_id, date_finished } => {
                println!(
                    "  {} {}  [{} {}]",
                    style("applied ").green(),
                    entry.migration_id,
                    batch_id,
                    date_finished.format("%Y-%m-%d %H:%M:%S")
                );
            }
            MigrationStatus::Orphaned { batch_id } => {
                println!(
                    "  {} {}  [{}, file missing]",
                    style("orphaned").red(),
                    entry.migration_id,
                    batch_id
                );
            }
        }
    }

    println!();
    println!("{} migration(s), {} pending", statuses.len(), pending);
    Ok(())
}
