use std::sync::Arc;

use tokio::sync::Mutex;

use notical_core::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Serializes webhook-triggered runs within this process. The state
    /// store's file lock still guards against other processes.
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config) -> AppState {
        AppState {
            config: Arc::new(config),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}
