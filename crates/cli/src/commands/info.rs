use console::style;

use tidemark_core::MigrateConfig;
use tidemark_migrations::Migrator;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub async fn run(migrator: &Migrator, config: &MigrateConfig, verbose: bool) -> anyhow::Result<()> {
    let info = migrator.info().await?;

    if verbose {
        print_sources(config);
    }

    println!("{}", style("Migration log").bold());
    println!("  Migrations folder: {}", config.script_folder().display());
    println!("  Log table:         {}", config.migration_table);

    let Some(last) = info.last_entry() else {
        println!();
        println!("There are no migration log entries");
        return Ok(());
    };

    println!("  Entries:           {}", info.count);
    println!("  Last batch:        {}", style(&last.batch_id).cyan());
    println!("  Last migration:    {}", last.migration_id);
    println!("  Finished:          {}", last.date_finished.format(TIME_FORMAT));
    println!();
    println!("{}", style("Migrations in the last batch").bold());
    for entry in &info.last_batch {
        println!("  {}", entry.migration_id);
    }
    Ok(())
}

fn print_sources(config: &MigrateConfig) {
    println!("{}", style("Configuration").bold());
    for (field, source) in config.sorted_sources() {
        println!("  {:<20} {}", field, style(source).dim());
    }
    println!();
}
