//! Reconciliation planning: diff a fetched snapshot against the stored
//! mapping into a minimal set of create/update/delete operations.

use std::collections::BTreeMap;

use crate::hash;
use crate::item::SourceItem;
use crate::state::{SyncDocument, SyncRecord};

#[derive(Debug, Clone)]
pub struct CreateOp {
    pub source_id: String,
    pub item: SourceItem,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct UpdateOp {
    pub source_id: String,
    pub item: SourceItem,
    pub event_id: String,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct DeleteOp {
    pub source_id: String,
    pub event_id: String,
}

/// The operations one run will apply, built fresh per run and discarded
/// after execution. Executed as updates, then creates, then deletes.
#[derive(Debug, Default)]
pub struct Plan {
    pub updates: Vec<UpdateOp>,
    pub creates: Vec<CreateOp>,
    pub deletes: Vec<DeleteOp>,
    pub skipped: usize,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.creates.is_empty() && self.deletes.is_empty()
    }

    pub fn total_ops(&self) -> usize {
        self.updates.len() + self.creates.len() + self.deletes.len()
    }
}

/// Diff `snapshot` against the stored mapping.
///
/// Every snapshot id missing from the store becomes a create; every stored
/// id missing from the snapshot becomes a delete; ids present in both are
/// skipped when the content hash is unchanged, else updated. A source id
/// occurring twice in one snapshot keeps its last occurrence only.
///
/// Unchanged items have their record re-saved with the freshly computed
/// hash, which upgrades any record still in the legacy bare-id shape.
pub fn build_plan(snapshot: &[SourceItem], doc: &mut SyncDocument) -> Plan {
    let by_id: BTreeMap<&str, &SourceItem> =
        snapshot.iter().map(|item| (item.id.as_str(), item)).collect();

    let mut plan = Plan::default();

    for (id, item) in &by_id {
        let computed = hash::content_hash(item);

        match doc.records.get(*id).cloned() {
            None => plan.creates.push(CreateOp {
                source_id: id.to_string(),
                item: (*item).clone(),
                content_hash: computed,
            }),
            Some(record) if record.content_hash.as_deref() == Some(computed.as_str()) => {
                plan.skipped += 1;
                doc.records.insert(
                    id.to_string(),
                    SyncRecord {
                        event_id: record.event_id,
                        content_hash: Some(computed),
                    },
                );
            }
            Some(record) => plan.updates.push(UpdateOp {
                source_id: id.to_string(),
                item: (*item).clone(),
                event_id: record.event_id,
                content_hash: computed,
            }),
        }
    }

    for (id, record) in &doc.records {
        if !by_id.contains_key(id.as_str()) {
            plan.deletes.push(DeleteOp {
                source_id: id.clone(),
                event_id: record.event_id.clone(),
            });
        }
    }

    plan
}
