mod routes;
mod signature;
mod singleton;
mod state;

use std::net::SocketAddr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use notical_core::Config;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Ensure only one instance is running
    let _lock = singleton::acquire_lock()?;

    let config = Config::load()?;
    let port = config.webhook.port;
    let state = AppState::new(config);

    let app = routes::router(&state).with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("notical-server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
