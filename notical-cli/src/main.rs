mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notical")]
#[command(about = "Sync a Notion database into Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the calendar with the Notion database
    Sync {
        /// Skip the changed-collection check and the mass-delete guard
        #[arg(short, long)]
        force: bool,

        /// Show what would change without touching the calendar
        #[arg(long)]
        dry_run: bool,
    },
    /// Authenticate with Google Calendar
    Auth,
    /// Delete every synced event from the calendar and clear local state
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { force, dry_run } => commands::sync::run(force, dry_run).await,
        Commands::Auth => commands::auth::run().await,
        Commands::Reset { yes } => commands::reset::run(yes).await,
    }
}
