//! The seam between the reconciliation engine and the calendar service.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{SyncError, SyncResult};
use crate::item::{EventTime, SourceItem};

/// Prefix that visually marks synced events in the calendar UI.
pub const SUMMARY_PREFIX: &str = "‣ ";

/// Private extended property identifying an event as sync-managed. The
/// reset utility finds managed events by filtering on this.
pub const MANAGED_MARKER_KEY: &str = "source";
pub const MANAGED_MARKER_VALUE: &str = "notical";

/// Calendar-side failures the executor reacts to.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The event is gone on the calendar (404/410). Recovered locally:
    /// updates re-create, deletes treat it as already done.
    #[error("Event not found on the calendar")]
    NotFound,

    #[error("Calendar API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TargetError {
    fn from(e: reqwest::Error) -> Self {
        TargetError::Http(e.to_string())
    }
}

/// Start/end field in the calendar's wire format: exactly one of `date`
/// (all-day) or `date_time` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl From<&EventTime> for EventDateTime {
    fn from(time: &EventTime) -> Self {
        match time {
            EventTime::Date(d) => EventDateTime {
                date: Some(*d),
                date_time: None,
                time_zone: None,
            },
            EventTime::DateTime(dt) => EventDateTime {
                date: None,
                date_time: Some(*dt),
                time_zone: Some("UTC".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerProperties {
    #[serde(default)]
    pub private: std::collections::BTreeMap<String, String>,
}

/// The calendar-service representation of one source item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    pub summary: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub extended_properties: MarkerProperties,
}

impl EventBody {
    /// Build the calendar body for a source item.
    ///
    /// Start and end must come out the same kind: a timed start with a
    /// date-only end collapses the end onto the start instant, and a
    /// date-only start drops any time component from the end.
    pub fn from_item(item: &SourceItem) -> SyncResult<EventBody> {
        let start = EventTime::parse(&item.start)
            .ok_or_else(|| SyncError::InvalidEventTime(item.id.clone()))?;

        let end_raw = if item.end.is_empty() {
            &item.start
        } else {
            &item.end
        };
        let end = EventTime::parse(end_raw)
            .ok_or_else(|| SyncError::InvalidEventTime(item.id.clone()))?;

        let (start, end) = match (start, end) {
            (EventTime::DateTime(dt), EventTime::Date(_)) => {
                (EventTime::DateTime(dt), EventTime::DateTime(dt))
            }
            (EventTime::Date(d), EventTime::DateTime(dt)) => {
                (EventTime::Date(d), EventTime::Date(dt.date_naive()))
            }
            (start, end) => (start, end),
        };

        let mut private = std::collections::BTreeMap::new();
        private.insert(
            MANAGED_MARKER_KEY.to_string(),
            MANAGED_MARKER_VALUE.to_string(),
        );

        Ok(EventBody {
            summary: format!("{}{}", SUMMARY_PREFIX, item.title),
            description: item.description.clone(),
            start: EventDateTime::from(&start),
            end: EventDateTime::from(&end),
            extended_properties: MarkerProperties { private },
        })
    }
}

/// The calendar the source collection is mirrored into.
#[async_trait]
pub trait TargetCalendar {
    /// Insert a new event, returning its calendar-assigned id.
    async fn insert(&self, body: &EventBody) -> Result<String, TargetError>;

    async fn update(&self, event_id: &str, body: &EventBody) -> Result<(), TargetError>;

    async fn delete(&self, event_id: &str) -> Result<(), TargetError>;

    /// List the ids of every sync-managed event on the calendar.
    async fn list_managed(&self) -> Result<Vec<String>, TargetError>;
}
