//! Whole-collection fingerprinting.
//!
//! A single digest over every item's (id, last-edited) pair lets the
//! orchestrator skip the fetch-and-diff path when nothing changed. This is
//! purely an optimization: a run without a fingerprint is slower, never
//! wrong.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::source::{EditStamp, SourceDatabase};

/// Digest a set of edit stamps deterministically.
///
/// Duplicates across pages collapse by id (last write wins), the survivors
/// are ordered by id, and the serialized form carries the item count so an
/// empty collection and a failed feed can never digest alike.
pub fn digest_stamps(stamps: &[EditStamp]) -> String {
    let merged: BTreeMap<&str, &str> = stamps
        .iter()
        .map(|s| (s.id.as_str(), s.last_edited.as_str()))
        .collect();

    let mut serialized = format!("COUNT:{}", merged.len());
    for (id, last_edited) in &merged {
        serialized.push('\n');
        serialized.push_str(id);
        serialized.push('|');
        serialized.push_str(last_edited);
    }

    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint the source collection, or `None` when the feed failed.
///
/// Callers must treat `None` as "unknown" and fall back to a full diff,
/// never as "unchanged".
pub async fn collection_fingerprint<S: SourceDatabase + Sync>(source: &S) -> Option<String> {
    match source.edit_feed().await {
        Ok(stamps) => Some(digest_stamps(&stamps)),
        Err(e) => {
            warn!(error = %e, "Could not fetch the edit feed, skipping the fingerprint short-circuit");
            None
        }
    }
}
