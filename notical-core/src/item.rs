//! Source-side item types.
//!
//! A `SourceItem` is one row of the synced Notion database, reduced to the
//! fields that matter for the calendar. Items are produced fresh on every
//! fetch and are immutable within a run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One item of the source database, as fetched.
///
/// `start` and `end` keep the raw ISO-8601 strings from the source so the
/// content hash stays a pure function of what the source returned. They are
/// parsed into [`EventTime`] only when a calendar body is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: String,
}

/// A point in time that is either a whole day or an instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl EventTime {
    /// Parse an ISO-8601 date or date-time string.
    ///
    /// Date-only values never carry a time component, so the presence of
    /// `T` decides the variant.
    pub fn parse(raw: &str) -> Option<EventTime> {
        if raw.contains('T') {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| EventTime::DateTime(dt.with_timezone(&Utc)))
        } else {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(EventTime::Date)
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self, EventTime::DateTime(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_only() {
        assert_eq!(
            EventTime::parse("2025-03-20"),
            Some(EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()))
        );
    }

    #[test]
    fn test_parse_datetime_normalizes_to_utc() {
        let parsed = EventTime::parse("2025-03-20T15:00:00+02:00").unwrap();
        assert_eq!(
            parsed,
            EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 13, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(EventTime::parse("not-a-date"), None);
        assert_eq!(EventTime::parse("2025-13-99"), None);
    }
}
