//! Google Calendar REST client: the target side of the sync.

pub mod auth;
mod session;

pub use session::SessionData;

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{Config, GoogleConfig};
use crate::error::SyncResult;
use crate::target::{
    EventBody, TargetCalendar, TargetError, MANAGED_MARKER_KEY, MANAGED_MARKER_VALUE,
};

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub struct GoogleCalendar {
    http: reqwest::Client,
    credentials: GoogleConfig,
    session_path: PathBuf,
    session: Mutex<SessionData>,
}

#[derive(Deserialize)]
struct InsertedEvent {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPage {
    #[serde(default)]
    items: Vec<InsertedEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl GoogleCalendar {
    /// Build a client from the stored session. Fails with an auth error
    /// when `notical auth` has not been run yet.
    pub fn new(config: &Config) -> SyncResult<GoogleCalendar> {
        let session_path = Config::session_path()?;
        let session = SessionData::load(&session_path)?;

        Ok(GoogleCalendar {
            http: reqwest::Client::new(),
            credentials: config.google.clone(),
            session_path,
            session: Mutex::new(session),
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            API_BASE,
            urlencode(&self.credentials.calendar_id)
        )
    }

    /// Current access token, refreshed and re-persisted when stale.
    async fn access_token(&self) -> Result<String, TargetError> {
        let mut session = self.session.lock().await;

        if session.needs_refresh() {
            let refreshed = session
                .refresh(&self.http, &self.credentials)
                .await
                .map_err(|e| TargetError::Api(e.to_string()))?;
            if let Err(e) = refreshed.save(&self.session_path) {
                debug!(error = %e, "Could not persist refreshed session");
            }
            *session = refreshed;
        }

        Ok(session.access_token.clone())
    }

    /// Map an error response, distinguishing "the event is gone".
    async fn classify(response: reqwest::Response) -> TargetError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return TargetError::NotFound;
        }

        let detail = response.text().await.unwrap_or_default();
        TargetError::Api(format!("{}: {}", status, detail.chars().take(200).collect::<String>()))
    }
}

fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

#[async_trait]
impl TargetCalendar for GoogleCalendar {
    async fn insert(&self, body: &EventBody) -> Result<String, TargetError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        let created: InsertedEvent = response
            .json()
            .await
            .map_err(|e| TargetError::Api(format!("Invalid insert response: {}", e)))?;
        Ok(created.id)
    }

    async fn update(&self, event_id: &str, body: &EventBody) -> Result<(), TargetError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .put(format!("{}/{}", self.events_url(), urlencode(event_id)))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Ok(())
    }

    async fn delete(&self, event_id: &str) -> Result<(), TargetError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .delete(format!("{}/{}", self.events_url(), urlencode(event_id)))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Ok(())
    }

    async fn list_managed(&self) -> Result<Vec<String>, TargetError> {
        let marker = format!("{}={}", MANAGED_MARKER_KEY, MANAGED_MARKER_VALUE);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.access_token().await?;
            let mut request = self
                .http
                .get(self.events_url())
                .bearer_auth(token)
                .query(&[
                    ("privateExtendedProperty", marker.as_str()),
                    ("singleEvents", "true"),
                ]);
            if let Some(page_token) = &page_token {
                request = request.query(&[("pageToken", page_token.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(Self::classify(response).await);
            }

            let page: EventPage = response
                .json()
                .await
                .map_err(|e| TargetError::Api(format!("Invalid list response: {}", e)))?;

            ids.extend(page.items.into_iter().map(|event| event.id));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }
}
