//! Per-item content fingerprinting.

use sha2::{Digest, Sha256};

use crate::item::SourceItem;

/// Bumping this invalidates every stored hash and forces a full re-push.
const HASH_VERSION: &str = "v1";

/// Field delimiter that cannot occur in item content.
const SEP: char = '\u{1f}';

/// Compute the content hash of one source item.
///
/// A pure function of title, start, end and description. Used for change
/// detection only, not security.
pub fn content_hash(item: &SourceItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(HASH_VERSION.as_bytes());
    for field in [&item.title, &item.start, &item.end, &item.description] {
        hasher.update([SEP as u8]);
        hasher.update(field.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
