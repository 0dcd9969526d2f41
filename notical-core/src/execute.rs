//! Plan execution against the target calendar.
//!
//! Operations are applied one at a time, updating the in-memory mapping as
//! each one succeeds. No operation failure blocks the remaining items; a
//! failed item keeps its stale record and is retried on the next run.

use tracing::{debug, info, warn};

use crate::plan::Plan;
use crate::state::{SyncDocument, SyncRecord};
use crate::target::{EventBody, TargetCalendar, TargetError};

/// What one run actually did (or, in dry-run mode, would have done).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ExecStats {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Apply `plan` to the target, mutating `doc` as operations succeed.
///
/// In dry-run mode no target calls are made and `doc` is untouched;
/// statistics are computed as if every operation succeeded.
pub async fn execute_plan<T: TargetCalendar + Sync>(
    target: &T,
    plan: &Plan,
    doc: &mut SyncDocument,
    dry_run: bool,
) -> ExecStats {
    let mut stats = ExecStats::default();

    if dry_run {
        stats.updated = plan.updates.len();
        stats.created = plan.creates.len();
        stats.deleted = plan.deletes.len();
        info!(
            updated = stats.updated,
            created = stats.created,
            deleted = stats.deleted,
            skipped = plan.skipped,
            "Dry run, no calendar calls made"
        );
        return stats;
    }

    for op in &plan.updates {
        let body = match EventBody::from_item(&op.item) {
            Ok(body) => body,
            Err(e) => {
                warn!(source_id = %op.source_id, error = %e, "Skipping update");
                continue;
            }
        };

        match target.update(&op.event_id, &body).await {
            Ok(()) => {
                doc.records.insert(
                    op.source_id.clone(),
                    SyncRecord {
                        event_id: op.event_id.clone(),
                        content_hash: Some(op.content_hash.clone()),
                    },
                );
                stats.updated += 1;
                debug!(source_id = %op.source_id, "Updated '{}'", op.item.title);
            }
            // Deleted out-of-band on the calendar: re-create it fresh.
            Err(TargetError::NotFound) => match target.insert(&body).await {
                Ok(new_id) => {
                    doc.records.insert(
                        op.source_id.clone(),
                        SyncRecord {
                            event_id: new_id,
                            content_hash: Some(op.content_hash.clone()),
                        },
                    );
                    stats.created += 1;
                    info!(source_id = %op.source_id, "Event vanished from the calendar, re-created '{}'", op.item.title);
                }
                Err(e) => {
                    warn!(source_id = %op.source_id, error = %e, "Failed to re-create '{}'", op.item.title);
                }
            },
            Err(e) => {
                warn!(source_id = %op.source_id, error = %e, "Failed to update '{}'", op.item.title);
            }
        }
    }

    for op in &plan.creates {
        let body = match EventBody::from_item(&op.item) {
            Ok(body) => body,
            Err(e) => {
                warn!(source_id = %op.source_id, error = %e, "Skipping create");
                continue;
            }
        };

        match target.insert(&body).await {
            Ok(event_id) => {
                doc.records.insert(
                    op.source_id.clone(),
                    SyncRecord {
                        event_id,
                        content_hash: Some(op.content_hash.clone()),
                    },
                );
                stats.created += 1;
                debug!(source_id = %op.source_id, "Created '{}'", op.item.title);
            }
            Err(e) => {
                warn!(source_id = %op.source_id, error = %e, "Failed to create '{}'", op.item.title);
            }
        }
    }

    for op in &plan.deletes {
        match target.delete(&op.event_id).await {
            // Already gone counts as deleted.
            Ok(()) | Err(TargetError::NotFound) => {
                doc.records.remove(&op.source_id);
                stats.deleted += 1;
                debug!(source_id = %op.source_id, event_id = %op.event_id, "Deleted");
            }
            Err(e) => {
                warn!(source_id = %op.source_id, event_id = %op.event_id, error = %e, "Failed to delete");
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SourceItem;
    use crate::plan::build_plan;
    use crate::target::TargetError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory calendar that can be seeded with failures.
    #[derive(Default)]
    struct FakeCalendar {
        events: Mutex<BTreeMap<String, EventBody>>,
        next_id: Mutex<usize>,
        fail_inserts: Mutex<bool>,
        calls: Mutex<usize>,
    }

    impl FakeCalendar {
        fn with_event(self, id: &str, item: &SourceItem) -> Self {
            self.events
                .lock()
                .unwrap()
                .insert(id.to_string(), EventBody::from_item(item).unwrap());
            self
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TargetCalendar for FakeCalendar {
        async fn insert(&self, body: &EventBody) -> Result<String, TargetError> {
            *self.calls.lock().unwrap() += 1;
            if *self.fail_inserts.lock().unwrap() {
                return Err(TargetError::Api("insert refused".to_string()));
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let id = format!("evt-{}", *next);
            self.events.lock().unwrap().insert(id.clone(), body.clone());
            Ok(id)
        }

        async fn update(&self, event_id: &str, body: &EventBody) -> Result<(), TargetError> {
            *self.calls.lock().unwrap() += 1;
            let mut events = self.events.lock().unwrap();
            match events.get_mut(event_id) {
                Some(stored) => {
                    *stored = body.clone();
                    Ok(())
                }
                None => Err(TargetError::NotFound),
            }
        }

        async fn delete(&self, event_id: &str) -> Result<(), TargetError> {
            *self.calls.lock().unwrap() += 1;
            match self.events.lock().unwrap().remove(event_id) {
                Some(_) => Ok(()),
                None => Err(TargetError::NotFound),
            }
        }

        async fn list_managed(&self) -> Result<Vec<String>, TargetError> {
            Ok(self.events.lock().unwrap().keys().cloned().collect())
        }
    }

    fn make_item(id: &str, title: &str) -> SourceItem {
        SourceItem {
            id: id.to_string(),
            title: title.to_string(),
            start: "2025-03-20".to_string(),
            end: "2025-03-20".to_string(),
            description: String::new(),
        }
    }

    fn record(event_id: &str, item: &SourceItem) -> SyncRecord {
        SyncRecord {
            event_id: event_id.to_string(),
            content_hash: Some(crate::hash::content_hash(item)),
        }
    }

    #[tokio::test]
    async fn test_creates_record_new_events() {
        let calendar = FakeCalendar::default();
        let mut doc = SyncDocument::default();
        let plan = build_plan(&[make_item("a", "A")], &mut doc);

        let stats = execute_plan(&calendar, &plan, &mut doc, false).await;

        assert_eq!(stats, ExecStats { created: 1, updated: 0, deleted: 0 });
        assert_eq!(doc.records["a"].event_id, "evt-1");
    }

    #[tokio::test]
    async fn test_update_not_found_recovers_by_recreating() {
        let old = make_item("a", "A");
        let calendar = FakeCalendar::default(); // no event seeded: update will 404
        let mut doc = SyncDocument::default();
        doc.records.insert("a".to_string(), record("evt-gone", &old));

        let plan = build_plan(&[make_item("a", "A edited")], &mut doc);
        let stats = execute_plan(&calendar, &plan, &mut doc, false).await;

        // Counted as a create, and the record now points at the fresh event.
        assert_eq!(stats, ExecStats { created: 1, updated: 0, deleted: 0 });
        assert_eq!(doc.records["a"].event_id, "evt-1");
    }

    #[tokio::test]
    async fn test_delete_not_found_still_removes_record() {
        let old = make_item("a", "A");
        let calendar = FakeCalendar::default();
        let mut doc = SyncDocument::default();
        doc.records.insert("a".to_string(), record("evt-gone", &old));

        let plan = build_plan(&[], &mut doc);
        let stats = execute_plan(&calendar, &plan, &mut doc, false).await;

        assert_eq!(stats.deleted, 1);
        assert!(doc.records.is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_leaves_item_for_next_run() {
        let calendar = FakeCalendar::default();
        *calendar.fail_inserts.lock().unwrap() = true;
        let mut doc = SyncDocument::default();

        let plan = build_plan(&[make_item("a", "A"), make_item("b", "B")], &mut doc);
        let stats = execute_plan(&calendar, &plan, &mut doc, false).await;

        // Both attempted, neither recorded: the failure does not fail the run.
        assert_eq!(stats.created, 0);
        assert!(doc.records.is_empty());
        assert_eq!(calendar.call_count(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_touching_anything() {
        let item = make_item("a", "A");
        let calendar = FakeCalendar::default().with_event("evt-1", &item);
        let mut doc = SyncDocument::default();
        doc.records.insert("a".to_string(), record("evt-1", &item));
        doc.records.insert("b".to_string(), record("evt-2", &make_item("b", "B")));

        let plan = build_plan(
            &[make_item("a", "A edited"), make_item("c", "C")],
            &mut doc,
        );
        let before = doc.clone();

        let stats = execute_plan(&calendar, &plan, &mut doc, true).await;

        assert_eq!(stats, ExecStats { created: 1, updated: 1, deleted: 1 });
        assert_eq!(doc, before);
        assert_eq!(calendar.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_item_time_is_isolated() {
        let calendar = FakeCalendar::default();
        let mut doc = SyncDocument::default();
        let mut bad = make_item("bad", "Broken");
        bad.start = "not-a-date".to_string();

        let plan = build_plan(&[bad, make_item("ok", "Fine")], &mut doc);
        let stats = execute_plan(&calendar, &plan, &mut doc, false).await;

        assert_eq!(stats.created, 1);
        assert!(doc.records.contains_key("ok"));
        assert!(!doc.records.contains_key("bad"));
    }
}
