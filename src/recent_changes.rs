//! Loop suppression for the service's own writes.
//!
//! Saving a record puts it back on the change feed. [`RecentChanges`]
//! remembers which patches were written recently so the echo of a write is
//! not applied again within the cooldown window.
//!
//! Entries are keyed by a SHA-256 digest of the base, record id and the JSON
//! form of the patch, separated by NUL bytes. Expired entries are purged on every access, which keeps
//! the map bounded by the writes of one cooldown window.

use crate::patch::RecordPatch;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default cooldown window.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(20_000);

/// Digest identifying one patch to one record.
#[must_use]
pub fn change_key(base: &str, record_id: &str, patch: &RecordPatch) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update([0]);
    hasher.update(record_id.as_bytes());
    hasher.update([0]);
    // serializing a struct of string lists cannot fail
    hasher.update(serde_json::to_vec(patch).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

/// Process-lifetime cache of recently written patches.
#[derive(Debug)]
pub struct RecentChanges {
    cooldown: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl Default for RecentChanges {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl RecentChanges {
    /// Create an empty cache with a cooldown window.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        RecentChanges {
            cooldown,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The cooldown window.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether this patch was written to the record within the window.
    ///
    /// A hit does not refresh the entry's timestamp.
    #[must_use]
    pub fn was_recently_applied(&self, base: &str, record_id: &str, patch: &RecordPatch) -> bool {
        self.was_recently_applied_at(&change_key(base, record_id, patch), Instant::now())
    }

    /// Remember that this patch was written to the record now.
    pub fn record(&self, base: &str, record_id: &str, patch: &RecordPatch) {
        self.record_at(change_key(base, record_id, patch), Instant::now());
    }

    /// Check and record in one step.
    ///
    /// Returns `true` if the patch is a repeat within the window; otherwise
    /// records it and returns `false`.
    pub fn check_and_record(&self, base: &str, record_id: &str, patch: &RecordPatch) -> bool {
        self.check_and_record_at(change_key(base, record_id, patch), Instant::now())
    }

    /// [`RecentChanges::was_recently_applied`] for a precomputed key and time.
    #[must_use]
    pub fn was_recently_applied_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        self.purge_locked(&mut entries, now);
        entries.contains_key(key)
    }

    /// [`RecentChanges::record`] for a precomputed key and time.
    pub fn record_at(&self, key: String, now: Instant) {
        let mut entries = self.entries.lock();
        self.purge_locked(&mut entries, now);
        entries.insert(key, now);
    }

    /// [`RecentChanges::check_and_record`] for a precomputed key and time.
    pub fn check_and_record_at(&self, key: String, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        self.purge_locked(&mut entries, now);
        if entries.contains_key(&key) {
            return true;
        }
        entries.insert(key, now);
        false
    }

    /// Drop entries older than the cooldown window.
    pub fn purge(&self, now: Instant) {
        let mut entries = self.entries.lock();
        self.purge_locked(&mut entries, now);
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_locked(&self, entries: &mut HashMap<String, Instant>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, at| now.saturating_duration_since(*at) < self.cooldown);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "purged expired recent changes");
        }
    }
}
