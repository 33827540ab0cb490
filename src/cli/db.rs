//! Database commands.

use console::style;

use crate::config::Settings;

pub async fn cmd_migrate(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context()?;

    println!(
        "{} Migrating {}",
        style("→").cyan(),
        style(ctx.display_url()).dim()
    );
    let applied = ctx.migrate().await?;

    if applied.is_empty() {
        println!("  {} Database is up to date", style("✓").green());
    } else {
        for name in &applied {
            println!("  {} Applied {}", style("✓").green(), name);
        }
    }
    Ok(())
}

pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let ctx = settings.create_db_context()?;
    let counts = ctx.jobs().count_by_status().await?;

    println!("{}", style("Job queue").bold());
    if counts.is_empty() {
        println!("  {}", style("empty").dim());
        return Ok(());
    }
    for (status, count) in counts {
        let label = match status.as_str() {
            "failed" => style(status).red(),
            "processing" => style(status).yellow(),
            "completed" => style(status).green(),
            _ => style(status).cyan(),
        };
        println!("  {:<12} {}", label, count);
    }
    Ok(())
}
