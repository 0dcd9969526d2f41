//! Webhook and health endpoints.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use notical_core::gcal::GoogleCalendar;
use notical_core::notion::NotionClient;
use notical_core::{StateStore, SyncEngine};

use crate::signature;
use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    // Accept both "/path" and "path" in the config.
    let mut path = state.config.webhook.path.clone();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }

    Router::new()
        .route(&path, post(webhook))
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let Some(secret) = state.config.webhook.secret.as_deref() else {
        warn!("webhook.secret is not set; rejecting webhook");
        return (StatusCode::UNAUTHORIZED, Json(json!({"status": "rejected"})));
    };

    let signature_header = headers
        .get("X-Notion-Signature")
        .and_then(|v| v.to_str().ok());

    if !signature::verify(secret, &body, signature_header) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"status": "rejected"})));
    }

    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    if !payload_targets_database(&payload, &state.config.database_id) {
        return (
            StatusCode::OK,
            Json(json!({"status": "ignored", "reason": "different_database"})),
        );
    }

    // Kick off the sync without blocking the webhook response. Runs are
    // serialized by the in-process lock; the source told us something
    // changed, so the fingerprint short-circuit is skipped.
    tokio::spawn(async move {
        let _guard = state.run_lock.lock().await;
        info!("Webhook-triggered sync starting");

        let result = async {
            let source = NotionClient::new(&state.config)?;
            let target = GoogleCalendar::new(&state.config)?;
            let store = StateStore::new(state.config.state_path()?);
            SyncEngine::new(source, target, store).run(true, false).await
        }
        .await;

        match result {
            Ok(outcome) => info!(?outcome, "Webhook-triggered sync finished"),
            Err(e) => error!(error = %e, "Webhook-triggered sync failed"),
        }
    });

    (StatusCode::ACCEPTED, Json(json!({"status": "accepted"})))
}

/// Whether the notification refers to the database we sync.
///
/// Notion payload shapes vary; walk the whole document for id-carrying
/// keys and compare dash-insensitively, falling back to a substring check
/// over the serialized payload.
fn payload_targets_database(payload: &Value, database_id: &str) -> bool {
    if database_id.is_empty() {
        return true;
    }

    let target = database_id.replace('-', "");

    let mut seen = Vec::new();
    collect_ids(payload, &mut seen);
    if seen.iter().any(|id| *id == target) {
        return true;
    }

    serde_json::to_string(payload)
        .map(|s| s.replace('-', "").contains(&target))
        .unwrap_or(false)
}

fn collect_ids(node: &Value, seen: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                if matches!(key.as_str(), "database_id" | "parent_id" | "id") {
                    if let Some(id) = value.as_str() {
                        seen.push(id.replace('-', ""));
                    }
                }
                collect_ids(value, seen);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_ids(item, seen);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DB: &str = "abc123def456";

    #[test]
    fn test_matches_database_id_key() {
        let payload = json!({"entity": {"database_id": "abc123-def456"}});
        assert!(payload_targets_database(&payload, DB));
    }

    #[test]
    fn test_matches_nested_parent_id() {
        let payload = json!({"events": [{"parent": {"parent_id": "abc123def456"}}]});
        assert!(payload_targets_database(&payload, DB));
    }

    #[test]
    fn test_other_database_is_ignored() {
        let payload = json!({"entity": {"database_id": "something-else"}});
        assert!(!payload_targets_database(&payload, DB));
    }

    #[test]
    fn test_unknown_database_id_allows_everything() {
        let payload = json!({"entity": {"database_id": "whatever"}});
        assert!(payload_targets_database(&payload, ""));
    }

    #[test]
    fn test_dashed_config_id_still_matches() {
        let payload = json!({"entity": {"id": "abc123def456"}});
        assert!(payload_targets_database(&payload, "abc123-def456"));
    }
}
