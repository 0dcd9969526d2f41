//! Mass-deletion safety guard.

/// A snapshot this much smaller than the known set is treated as a failed
/// fetch rather than an intentional wipe.
const MASS_DELETE_THRESHOLD: usize = 10;

/// Decide whether a plan built from `snapshot_len` fetched items may run
/// against a store that knows `known_len` synced items.
///
/// An empty fetch against a well-populated store almost always means an
/// upstream failure or misconfiguration, not a user deleting everything.
/// Operators override a false veto with a forced run.
pub fn allow(snapshot_len: usize, known_len: usize, forced: bool) -> bool {
    forced || snapshot_len > 0 || known_len <= MASS_DELETE_THRESHOLD
}
