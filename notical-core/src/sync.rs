//! The sync orchestrator: fingerprint-check, fetch, plan, guard, execute,
//! persist.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::execute::{self, ExecStats};
use crate::fingerprint;
use crate::guard;
use crate::plan;
use crate::source::SourceDatabase;
use crate::state::StateStore;
use crate::target::TargetCalendar;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// The full pipeline ran; these are the applied (or dry-run) counts.
    Synced(ExecStats),
    /// The collection fingerprint matched the stored one; nothing fetched.
    Unchanged,
    /// The safety guard vetoed an anomalous-looking plan. Needs `force`
    /// to override.
    Vetoed,
    /// Another run holds the state store; retried on the next trigger.
    Locked,
}

impl RunOutcome {
    /// Whether a sync actually executed.
    pub fn ran(&self) -> bool {
        matches!(self, RunOutcome::Synced(_))
    }
}

/// Owns one source collection, one target calendar and one state store,
/// and reconciles them. A run is strictly sequential; overlap between runs
/// is excluded by the store lock.
pub struct SyncEngine<S, T> {
    source: S,
    target: T,
    store: StateStore,
}

impl<S, T> SyncEngine<S, T>
where
    S: SourceDatabase + Sync,
    T: TargetCalendar + Sync,
{
    pub fn new(source: S, target: T, store: StateStore) -> Self {
        SyncEngine {
            source,
            target,
            store,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// `force` skips the fingerprint short-circuit and overrides the
    /// safety guard. `dry_run` computes and reports the plan without
    /// touching the calendar or the persisted state.
    ///
    /// The state document is written exactly once, after execution, and
    /// only when the run is neither a dry run nor aborted; a run that
    /// fails mid-way leaves the persisted state as it was.
    pub async fn run(&self, force: bool, dry_run: bool) -> SyncResult<RunOutcome> {
        let Some(_lock) = self.store.try_lock()? else {
            warn!("Another sync run is in progress, backing off");
            return Ok(RunOutcome::Locked);
        };

        let mut doc = self.store.load();

        let current_fingerprint = fingerprint::collection_fingerprint(&self.source).await;
        if !force && !dry_run {
            if let (Some(current), Some(stored)) =
                (&current_fingerprint, &doc.collection_fingerprint)
            {
                if current == stored {
                    info!("Source collection unchanged, nothing to do");
                    return Ok(RunOutcome::Unchanged);
                }
            }
        }

        let snapshot = self.source.fetch_items().await?;
        info!(items = snapshot.len(), "Fetched source snapshot");

        let known_len = doc.records.len();
        let plan = plan::build_plan(&snapshot, &mut doc);

        if !guard::allow(snapshot.len(), known_len, force) {
            warn!(
                known = known_len,
                "Source returned no items while the store has synced events; refusing to mass-delete (re-run with force to override)"
            );
            return Ok(RunOutcome::Vetoed);
        }

        info!(
            updates = plan.updates.len(),
            creates = plan.creates.len(),
            deletes = plan.deletes.len(),
            skipped = plan.skipped,
            "Plan ready"
        );

        let stats = execute::execute_plan(&self.target, &plan, &mut doc, dry_run).await;

        if !dry_run {
            doc.collection_fingerprint = current_fingerprint;
            doc.last_run = Some(Utc::now());
            self.store.save(&doc)?;
        }

        info!(
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            "Sync complete"
        );
        Ok(RunOutcome::Synced(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::item::SourceItem;
    use crate::source::EditStamp;
    use crate::state::{SyncDocument, SyncRecord};
    use crate::target::{EventBody, TargetError};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        items: Mutex<Vec<SourceItem>>,
        fail_fetch: Mutex<bool>,
        fail_feed: Mutex<bool>,
        fetch_calls: Mutex<usize>,
    }

    impl FakeSource {
        fn set_items(&self, items: Vec<SourceItem>) {
            *self.items.lock().unwrap() = items;
        }

        fn fetch_count(&self) -> usize {
            *self.fetch_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl SourceDatabase for FakeSource {
        async fn fetch_items(&self) -> SyncResult<Vec<SourceItem>> {
            *self.fetch_calls.lock().unwrap() += 1;
            if *self.fail_fetch.lock().unwrap() {
                return Err(SyncError::SourceFetch("source is down".to_string()));
            }
            Ok(self.items.lock().unwrap().clone())
        }

        async fn edit_feed(&self) -> SyncResult<Vec<EditStamp>> {
            if *self.fail_feed.lock().unwrap() {
                return Err(SyncError::SourceFetch("source is down".to_string()));
            }
            Ok(self
                .items
                .lock()
                .unwrap()
                .iter()
                .map(|item| EditStamp {
                    id: item.id.clone(),
                    // Content stands in for an edit timestamp.
                    last_edited: item.title.clone(),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeCalendar {
        events: Mutex<BTreeMap<String, EventBody>>,
        next_id: Mutex<usize>,
        calls: Mutex<usize>,
    }

    impl FakeCalendar {
        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TargetCalendar for FakeCalendar {
        async fn insert(&self, body: &EventBody) -> Result<String, TargetError> {
            *self.calls.lock().unwrap() += 1;
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

    fn engine_in(
        dir: &tempfile::TempDir,
    ) -> SyncEngine<FakeSource, FakeCalendar> {
        SyncEngine::new(
            FakeSource::default(),
            FakeCalendar::default(),
            StateStore::new(dir.path().join("state.json")),
        )
    }

    #[tokio::test]
    async fn test_first_run_creates_everything() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);
        engine.source.set_items(vec![make_item("a", "A"), make_item("b", "B")]);

        let outcome = engine.run(false, false).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Synced(ExecStats { created: 2, updated: 0, deleted: 0 })
        );
        assert!(outcome.ran());

        let doc = engine.store.load();
        assert_eq!(doc.records.len(), 2);
        assert!(doc.collection_fingerprint.is_some());
        assert!(doc.last_run.is_some());
    }

    #[tokio::test]
    async fn test_second_run_short_circuits_on_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);
        engine.source.set_items(vec![make_item("a", "A")]);

        engine.run(false, false).await.unwrap();
        let calls_after_first = engine.target.call_count();

        let outcome = engine.run(false, false).await.unwrap();

        assert_eq!(outcome, RunOutcome::Unchanged);
        assert!(!outcome.ran());
        // No item fetch and no calendar calls on the second run.
        assert_eq!(engine.source.fetch_count(), 1);
        assert_eq!(engine.target.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn test_runs_are_idempotent_without_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);
        engine.source.set_items(vec![make_item("a", "A")]);
        // Break the edit feed so every run takes the full diff path.
        *engine.source.fail_feed.lock().unwrap() = true;

        engine.run(false, false).await.unwrap();
        let doc_after_first = engine.store.load();

        let outcome = engine.run(false, false).await.unwrap();

        let RunOutcome::Synced(stats) = outcome else {
            panic!("expected a full run, got {:?}", outcome);
        };
        assert!(stats.is_noop());

        let doc_after_second = engine.store.load();
        assert_eq!(doc_after_first.records, doc_after_second.records);
    }

    #[tokio::test]
    async fn test_forced_run_ignores_matching_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);
        engine.source.set_items(vec![make_item("a", "A")]);

        engine.run(false, false).await.unwrap();
        let outcome = engine.run(true, false).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Synced(_)));
        assert_eq!(engine.source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_guard_veto_leaves_state_file_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);

        let items: Vec<SourceItem> = (0..11)
            .map(|i| make_item(&format!("id-{:02}", i), "Item"))
            .collect();
        engine.source.set_items(items);
        engine.run(false, false).await.unwrap();

        let bytes_before = std::fs::read(engine.store.path()).unwrap();

        // Source suddenly reports nothing.
        engine.source.set_items(vec![]);
        let outcome = engine.run(false, false).await.unwrap();

        assert_eq!(outcome, RunOutcome::Vetoed);
        assert!(!outcome.ran());
        assert_eq!(std::fs::read(engine.store.path()).unwrap(), bytes_before);
        // No deletes were issued.
        assert_eq!(engine.target.events.lock().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_forced_run_overrides_the_guard() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);

        let items: Vec<SourceItem> = (0..11)
            .map(|i| make_item(&format!("id-{:02}", i), "Item"))
            .collect();
        engine.source.set_items(items);
        engine.run(false, false).await.unwrap();

        engine.source.set_items(vec![]);
        let outcome = engine.run(true, false).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Synced(ExecStats { created: 0, updated: 0, deleted: 11 })
        );
        assert!(engine.store.load().records.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);
        engine.source.set_items(vec![make_item("a", "A")]);
        engine.run(false, false).await.unwrap();
        let bytes_before = std::fs::read(engine.store.path()).unwrap();

        engine.source.set_items(vec![make_item("a", "A edited")]);
        *engine.source.fail_fetch.lock().unwrap() = true;
        *engine.source.fail_feed.lock().unwrap() = true;

        let result = engine.run(false, false).await;

        assert!(matches!(result, Err(SyncError::SourceFetch(_))));
        assert_eq!(std::fs::read(engine.store.path()).unwrap(), bytes_before);
    }

    #[tokio::test]
    async fn test_dry_run_never_persists_or_calls_target() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);
        engine.source.set_items(vec![make_item("a", "A")]);

        let outcome = engine.run(false, true).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Synced(ExecStats { created: 1, updated: 0, deleted: 0 })
        );
        assert_eq!(engine.target.call_count(), 0);
        assert!(!engine.store.path().exists());
    }

    #[tokio::test]
    async fn test_edit_detected_via_changed_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);
        engine.source.set_items(vec![make_item("a", "A")]);
        engine.run(false, false).await.unwrap();

        engine.source.set_items(vec![make_item("a", "A edited")]);
        let outcome = engine.run(false, false).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Synced(ExecStats { created: 0, updated: 1, deleted: 0 })
        );
    }

    #[tokio::test]
    async fn test_legacy_store_migrates_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir);
        let item = make_item("a", "A");
        engine.source.set_items(vec![item.clone()]);

        // Seed a legacy record pointing at a live event.
        let body = EventBody::from_item(&item).unwrap();
        engine
            .target
            .events
            .lock()
            .unwrap()
            .insert("evt-old".to_string(), body);
        let mut doc = SyncDocument::default();
        doc.records.insert(
            "a".to_string(),
            SyncRecord {
                event_id: "evt-old".to_string(),
                content_hash: None,
            },
        );
        engine.store.save(&doc).unwrap();

        let outcome = engine.run(false, false).await.unwrap();

        // The hashless record is re-pushed once, then settles.
        assert_eq!(
            outcome,
            RunOutcome::Synced(ExecStats { created: 0, updated: 1, deleted: 0 })
        );
        let migrated = engine.store.load();
        assert_eq!(migrated.records["a"].event_id, "evt-old");
        assert!(migrated.records["a"].content_hash.is_some());
    }
}
