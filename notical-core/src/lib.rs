//! Core library for notical: one-way sync from a Notion database to a
//! Google calendar.
//!
//! The reconciliation engine ([`sync::SyncEngine`]) diffs a fetched source
//! snapshot against the persisted mapping ([`state::StateStore`]) and
//! applies the minimal create/update/delete plan to the calendar. The
//! `notion` and `gcal` modules are the concrete ends of the pipe; tests
//! and other frontends can plug anything that implements
//! [`source::SourceDatabase`] and [`target::TargetCalendar`].

pub mod config;
pub mod error;
pub mod execute;
pub mod fingerprint;
pub mod gcal;
pub mod guard;
pub mod hash;
pub mod item;
pub mod notion;
pub mod plan;
pub mod source;
pub mod state;
pub mod sync;
pub mod target;

pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use item::SourceItem;
pub use state::StateStore;
pub use sync::{RunOutcome, SyncEngine};
