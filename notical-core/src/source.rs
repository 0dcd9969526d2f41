//! The seam between the reconciliation engine and the source database.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::item::SourceItem;

/// One entry of the source's change feed: which item exists and when it
/// was last edited. The fingerprinter digests these.
#[derive(Debug, Clone, PartialEq)]
pub struct EditStamp {
    pub id: String,
    pub last_edited: String,
}

/// The upstream collection being mirrored.
#[async_trait]
pub trait SourceDatabase {
    /// Fetch the full item snapshot, merged across pages. Fails on
    /// transport or auth errors, which abort a run before any mutation.
    async fn fetch_items(&self) -> SyncResult<Vec<SourceItem>>;

    /// Stream (id, last-edited) pairs for every non-archived item.
    async fn edit_feed(&self) -> SyncResult<Vec<EditStamp>>;
}
