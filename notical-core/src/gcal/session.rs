//! Google session (token) storage and refresh.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GoogleConfig;
use crate::error::{SyncError, SyncResult};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the token actually expires.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token endpoint response, shared by the consent-flow exchange and the
/// refresh path.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub expires_in: i64,
}

impl SessionData {
    pub(crate) fn from_token_response(response: TokenResponse, previous_refresh: &str) -> Self {
        // Google usually omits the refresh token on refresh; keep the one
        // we already have.
        let refresh_token = if response.refresh_token.is_empty() {
            previous_refresh.to_string()
        } else {
            response.refresh_token
        };

        SessionData {
            access_token: response.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
        }
    }

    pub fn load(path: &Path) -> SyncResult<SessionData> {
        let content = std::fs::read_to_string(path).map_err(|_| {
            SyncError::Auth("Not authenticated with Google. Run `notical auth` first".into())
        })?;

        toml::from_str(&content)
            .map_err(|e| SyncError::Auth(format!("Invalid session file: {}", e)))
    }

    pub fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Auth(format!("Could not serialize session: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_SLACK_SECS) >= self.expires_at
    }

    /// Exchange the refresh token for a fresh access token.
    pub(crate) async fn refresh(
        &self,
        http: &reqwest::Client,
        credentials: &GoogleConfig,
    ) -> SyncResult<SessionData> {
        debug!("Access token expired, refreshing");

        let response = http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("Token refresh failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Auth(format!(
                "Token refresh returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("Invalid token response: {}", e)))?;

        Ok(SessionData::from_token_response(token, &self.refresh_token))
    }
}

/// Exchange an authorization code from the consent flow for tokens.
pub(crate) async fn exchange_code(
    http: &reqwest::Client,
    credentials: &GoogleConfig,
    code: &str,
    redirect_uri: &str,
) -> SyncResult<SessionData> {
    let response = http
        .post(TOKEN_URL)
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| SyncError::Auth(format!("Code exchange failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(SyncError::Auth(format!(
            "Code exchange returned {}",
            response.status()
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| SyncError::Auth(format!("Invalid token response: {}", e)))?;

    Ok(SessionData::from_token_response(token, ""))
}
