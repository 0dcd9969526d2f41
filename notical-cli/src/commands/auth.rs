use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use notical_core::gcal::auth;
use notical_core::Config;

pub async fn run() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    auth::authenticate(&config).await?;

    println!("{} Authenticated with Google Calendar", "✓".green());
    Ok(())
}
