use anyhow::{Context, Result};
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use notical_core::gcal::GoogleCalendar;
use notical_core::target::TargetCalendar;
use notical_core::{Config, StateStore};

/// Delete every sync-managed event from the calendar, then remove the
/// local state file so the next run starts fresh.
pub async fn run(yes: bool) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let target = GoogleCalendar::new(&config)?;

    let event_ids = target
        .list_managed()
        .await
        .context("Failed to list synced events")?;

    if event_ids.is_empty() {
        println!("No synced events found in Google Calendar.");
    } else {
        if !yes {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Delete {} synced events from the calendar?",
                    event_ids.len()
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Aborted.");
                return Ok(());
            }
        }

        let total = event_ids.len();
        let mut failed = 0;
        for (i, event_id) in event_ids.iter().enumerate() {
            if let Err(e) = target.delete(event_id).await {
                eprintln!("{} Failed to delete {}: {}", "!".yellow(), event_id, e);
                failed += 1;
            }
            if (i + 1) % 10 == 0 {
                println!("Deleted {}/{} events...", i + 1 - failed, total);
            }
        }
        println!(
            "{} Calendar cleanup complete ({} deleted, {} failed)",
            "✓".green(),
            total - failed,
            failed
        );
    }

    // Dropping the state file also resets last_run and the collection
    // fingerprint, so the next sync is a full one.
    let store = StateStore::new(config.state_path()?);
    match std::fs::remove_file(store.path()) {
        Ok(()) => println!("{} Removed {}", "✓".green(), store.path().display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("State file not found, already reset.");
        }
        Err(e) => return Err(e).context("Failed to remove state file"),
    }

    println!("Reset complete. The next run will be a fresh sync.");
    Ok(())
}
