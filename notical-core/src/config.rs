//! Global notical configuration.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{SyncError, SyncResult};

fn default_date_property() -> String {
    "Do Date".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_notion_timeout_ms() -> u64 {
    20_000
}

fn default_webhook_path() -> String {
    "/notion/webhook".to_string()
}

fn default_webhook_port() -> u16 {
    8000
}

/// Global configuration at ~/.config/notical/config.toml
///
/// Secrets (Notion token, webhook secret) can be left out of the file and
/// provided via `NOTION_TOKEN` / `NOTION_WEBHOOK_SECRET` instead.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notion_token: String,

    pub database_id: String,

    /// Name of the Notion date property that schedules an item.
    #[serde(default = "default_date_property")]
    pub date_property: String,

    #[serde(default = "default_notion_timeout_ms")]
    pub notion_timeout_ms: u64,

    /// Where the sync mapping document lives. Defaults to the platform
    /// data directory.
    #[serde(default)]
    pub state_path: Option<PathBuf>,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        GoogleConfig {
            client_id: String::new(),
            client_secret: String::new(),
            calendar_id: default_calendar_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_webhook_path")]
    pub path: String,
    #[serde(default = "default_webhook_port")]
    pub port: u16,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        WebhookConfig {
            secret: None,
            path: default_webhook_path(),
            port: default_webhook_port(),
        }
    }
}

impl Config {
    pub fn config_dir() -> SyncResult<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))?
            .join("notical");
        Ok(dir)
    }

    pub fn config_path() -> SyncResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn load() -> SyncResult<Config> {
        let path = Self::config_path()?;
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SyncError::Config(format!("Could not read {}: {}", path.display(), e))
        })?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("Invalid config file: {}", e)))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over the config file for secrets.
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("NOTION_TOKEN") {
            self.notion_token = token;
        }
        if let Ok(secret) = std::env::var("NOTION_WEBHOOK_SECRET") {
            self.webhook.secret = Some(secret);
        }
    }

    fn validate(&self) -> SyncResult<()> {
        if self.notion_token.is_empty() {
            return Err(SyncError::Config(
                "notion_token is not set (config file or NOTION_TOKEN)".into(),
            ));
        }
        if self.database_id.is_empty() {
            return Err(SyncError::Config("database_id is not set".into()));
        }
        Ok(())
    }

    /// Path of the persisted sync mapping document.
    pub fn state_path(&self) -> SyncResult<PathBuf> {
        if let Some(path) = &self.state_path {
            return Ok(path.clone());
        }

        let dir = dirs::data_dir()
            .ok_or_else(|| SyncError::Config("Could not determine data directory".into()))?
            .join("notical");
        Ok(dir.join("synced_events.json"))
    }

    /// Path of the Google session (token) file.
    pub fn session_path() -> SyncResult<PathBuf> {
        Ok(Self::config_dir()?.join("session.toml"))
    }
}
