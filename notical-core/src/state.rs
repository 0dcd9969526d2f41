//! Durable sync state: the source-id to calendar-event mapping.
//!
//! The whole document is one JSON file, written atomically via a temp file
//! and rename. A corrupt or missing file loads as an empty store, which
//! makes the next run replan every item as a create (degraded, not fatal).

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// One synced item: the calendar event it maps to and the content hash it
/// was last pushed with. A missing hash means the content state on the
/// calendar is unknown and the item will be re-pushed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncRecord {
    pub event_id: String,
    pub content_hash: Option<String>,
}

/// On-disk record shape. Older state files stored a bare event-id string
/// per source id; both shapes decode, and the store always writes the
/// current shape back.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Current {
        event_id: String,
        #[serde(default)]
        content_hash: Option<String>,
    },
    Legacy(String),
}

impl From<StoredRecord> for SyncRecord {
    fn from(stored: StoredRecord) -> Self {
        match stored {
            StoredRecord::Current {
                event_id,
                content_hash,
            } => SyncRecord {
                event_id,
                content_hash,
            },
            StoredRecord::Legacy(event_id) => SyncRecord {
                event_id,
                content_hash: None,
            },
        }
    }
}

impl<'de> Deserialize<'de> for SyncRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        StoredRecord::deserialize(deserializer).map(SyncRecord::from)
    }
}

/// The single unit of durable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncDocument {
    #[serde(default)]
    pub records: BTreeMap<String, SyncRecord>,

    #[serde(default)]
    pub collection_fingerprint: Option<String>,

    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

/// Loads and persists the sync document, and hands out the exclusive lock
/// that keeps concurrent runs from mutating it at the same time.
pub struct StateStore {
    path: PathBuf,
}

/// Advisory lock released on drop.
pub struct StateLock {
    _file: File,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> StateStore {
        StateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, treating a missing or unreadable file as empty.
    pub fn load(&self) -> SyncDocument {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return SyncDocument::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read state file, starting from an empty store");
                return SyncDocument::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file is corrupt, starting from an empty store; the next run re-creates every item");
                SyncDocument::default()
            }
        }
    }

    /// Persist the document atomically (temp file + rename).
    pub fn save(&self, doc: &SyncDocument) -> SyncResult<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| SyncError::State("State path has no parent directory".into()))?;
        fs::create_dir_all(dir)?;

        let temp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(doc)?;
        fs::write(&temp, content)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    /// Try to take the single-writer lock. Returns `None` when another run
    /// already holds it.
    pub fn try_lock(&self) -> SyncResult<Option<StateLock>> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| SyncError::State("State path has no parent directory".into()))?;
        fs::create_dir_all(dir)?;

        let lock_path = self.path.with_extension("lock");
        let file = File::create(&lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(StateLock { _file: file })),
            Err(_) => Ok(None),
        }
    }
}
