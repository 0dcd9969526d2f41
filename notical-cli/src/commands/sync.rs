use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use notical_core::gcal::GoogleCalendar;
use notical_core::notion::NotionClient;
use notical_core::sync::RunOutcome;
use notical_core::{Config, StateStore, SyncEngine};

pub async fn run(force: bool, dry_run: bool) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    let source = NotionClient::new(&config)?;
    let target = GoogleCalendar::new(&config)?;
    let store = StateStore::new(config.state_path()?);
    let engine = SyncEngine::new(source, target, store);

    let outcome = engine.run(force, dry_run).await?;

    match outcome {
        RunOutcome::Synced(stats) => {
            let label = if dry_run { "Would sync" } else { "Synced" };
            if stats.is_noop() {
                println!("{} Everything already in sync", "✓".green());
            } else {
                println!(
                    "{} {}: {} created, {} updated, {} deleted",
                    "✓".green(),
                    label,
                    stats.created,
                    stats.updated,
                    stats.deleted
                );
            }
        }
        RunOutcome::Unchanged => {
            println!("{} Notion database unchanged, nothing to do", "✓".green());
        }
        RunOutcome::Vetoed => {
            println!(
                "{} Notion returned no items but the calendar has synced events.\n  \
                This usually means a fetch failure; re-run with --force to really delete everything.",
                "!".yellow()
            );
        }
        RunOutcome::Locked => {
            println!("{} Another sync is already running, try again shortly", "!".yellow());
        }
    }

    Ok(())
}
