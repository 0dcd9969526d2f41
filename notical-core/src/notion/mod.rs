//! Notion API client: the source side of the sync.

mod content;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::item::SourceItem;
use crate::source::{EditStamp, SourceDatabase};

const API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Page size for block-children requests, kept small so a single huge
/// page cannot hang the request.
const BLOCK_PAGE_SIZE: u32 = 50;

pub struct NotionClient {
    http: reqwest::Client,
    database_id: String,
    date_property: String,
}

/// Envelope shared by Notion's paginated list endpoints.
#[derive(Deserialize)]
struct PageList {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl NotionClient {
    pub fn new(config: &Config) -> SyncResult<NotionClient> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.notion_token))
            .map_err(|_| SyncError::Config("Notion token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.notion_timeout_ms))
            .build()
            .map_err(|e| SyncError::Config(format!("Could not build HTTP client: {}", e)))?;

        Ok(NotionClient {
            http,
            database_id: config.database_id.clone(),
            date_property: config.date_property.clone(),
        })
    }

    /// Run one database query page. `start_cursor` is `None` on the first
    /// call and the previous response's cursor afterwards.
    async fn query_page(&self, start_cursor: Option<&str>) -> SyncResult<PageList> {
        let mut body = serde_json::Map::new();
        if let Some(cursor) = start_cursor {
            body.insert("start_cursor".to_string(), Value::String(cursor.to_string()));
        }

        let response = self
            .http
            .post(format!("{}/databases/{}/query", API_BASE, self.database_id))
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| SyncError::SourceFetch(format!("Database query failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::SourceFetch(format!(
                "Database query returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::SourceFetch(format!("Invalid query response: {}", e)))
    }

    /// Collect every page of the database query.
    async fn query_all(&self) -> SyncResult<Vec<Value>> {
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let list = self.query_page(cursor.as_deref()).await?;
            pages.extend(list.results);

            if !list.has_more {
                break;
            }
            cursor = list.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(pages)
    }

    /// Fetch the readable text content of one page, paginating through its
    /// blocks. Failures degrade to an empty description so one unreadable
    /// page cannot abort the whole run.
    async fn page_content(&self, page_id: &str) -> String {
        let mut texts: Vec<String> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/blocks/{}/children", API_BASE, page_id))
                .query(&[("page_size", BLOCK_PAGE_SIZE.to_string())]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("start_cursor", cursor.as_str())]);
            }

            let list: PageList = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json().await {
                        Ok(list) => list,
                        Err(e) => {
                            warn!(page_id, error = %e, "Invalid block response, leaving description empty");
                            return String::new();
                        }
                    }
                }
                Ok(response) => {
                    warn!(page_id, status = %response.status(), "Failed to fetch page content");
                    return String::new();
                }
                Err(e) => {
                    warn!(page_id, error = %e, "Failed to fetch page content");
                    return String::new();
                }
            };

            texts.extend(list.results.iter().filter_map(content::render_block));

            if !list.has_more {
                break;
            }
            cursor = list.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        texts.join("\n").trim().to_string()
    }

    /// Turn one query result into a `SourceItem`, or `None` when the page
    /// has no date set (undated items are not calendar material).
    async fn to_item(&self, page: &Value) -> Option<SourceItem> {
        let id = page.get("id")?.as_str()?.to_string();
        let props = page.get("properties")?;

        let date = props.get(&self.date_property)?.get("date")?;
        let start = date.get("start")?.as_str()?.to_string();
        let end = date
            .get("end")
            .and_then(Value::as_str)
            .unwrap_or(&start)
            .to_string();

        let title = title_of(props);
        let description = self.page_content(&id).await;

        Some(SourceItem {
            id,
            title,
            start,
            end,
            description,
        })
    }
}

/// First fragment of the `Name` title property, `Untitled` when empty.
fn title_of(props: &Value) -> String {
    props
        .get("Name")
        .and_then(|name| name.get("title"))
        .and_then(Value::as_array)
        .and_then(|fragments| fragments.first())
        .and_then(|first| {
            first
                .get("plain_text")
                .and_then(Value::as_str)
                .or_else(|| {
                    first
                        .get("text")
                        .and_then(|t| t.get("content"))
                        .and_then(Value::as_str)
                })
        })
        .unwrap_or("Untitled")
        .to_string()
}

#[async_trait]
impl SourceDatabase for NotionClient {
    async fn fetch_items(&self) -> SyncResult<Vec<SourceItem>> {
        let pages = self.query_all().await?;

        // Merge by id so a page returned twice across cursors collapses,
        // last occurrence winning.
        let mut items: BTreeMap<String, SourceItem> = BTreeMap::new();
        for page in &pages {
            if let Some(item) = self.to_item(page).await {
                items.insert(item.id.clone(), item);
            }
        }

        debug!(items = items.len(), pages = pages.len(), "Fetched Notion snapshot");
        Ok(items.into_values().collect())
    }

    async fn edit_feed(&self) -> SyncResult<Vec<EditStamp>> {
        let pages = self.query_all().await?;

        Ok(pages
            .iter()
            .filter(|page| {
                !page
                    .get("archived")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .filter_map(|page| {
                Some(EditStamp {
                    id: page.get("id")?.as_str()?.to_string(),
                    last_edited: page.get("last_edited_time")?.as_str()?.to_string(),
                })
            })
            .collect())
    }
}
