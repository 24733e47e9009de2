//! Units of work and per-record outcomes.
//!
//! A [`Change`] names one record that was modified in the catalog. Handling
//! it touches zero or more records, each ending in one [`RecordOutcome`].
//! `commit_update` is the shared last step of both flows: it compares the
//! updated record to the loaded one, applies loop suppression and the dry-run
//! switch, and saves.

use crate::error::StoreError;
use crate::patch::RecordPatch;
use crate::recent_changes::RecentChanges;
use crate::record::Record;
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// A modified record reported by the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// Base the record lives in
    pub library: String,
    /// Record identifier
    pub record_id: String,
}

impl Change {
    /// Create a change for a record.
    pub fn new(library: impl Into<String>, record_id: impl Into<String>) -> Self {
        Change {
            library: library.into(),
            record_id: record_id.into(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.library, self.record_id)
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    /// The updated record was saved
    Saved,
    /// Nothing needed changing
    Unchanged,
    /// The same patch was saved within the cooldown window
    Suppressed,
    /// A change was computed but the dry-run switch is on
    DryRun,
    /// The record is deleted and was skipped
    Deleted,
    /// Processing failed; the message names the error
    Failed(String),
}

impl RecordOutcome {
    /// Short name used in log lines.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RecordOutcome::Saved => "saved",
            RecordOutcome::Unchanged => "unchanged",
            RecordOutcome::Suppressed => "suppressed",
            RecordOutcome::DryRun => "dry_run",
            RecordOutcome::Deleted => "deleted",
            RecordOutcome::Failed(_) => "failed",
        }
    }
}

/// Outcome for one record touched while handling a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReport {
    /// Base of the record
    pub base: String,
    /// Record identifier
    pub id: String,
    /// What happened
    pub outcome: RecordOutcome,
}

/// Save `updated` if it differs from `original`.
///
/// Loop suppression is checked before saving and the patch is remembered only
/// once the store accepted it.
///
/// # Errors
///
/// Returns the store's error if saving fails.
pub(crate) async fn commit_update<S: RecordStore + ?Sized>(
    store: &S,
    recent: &RecentChanges,
    base: &str,
    id: &str,
    original: &Record,
    updated: &Record,
    dry_run: bool,
) -> Result<RecordOutcome, StoreError> {
    if original.fields == updated.fields && original.leader == updated.leader {
        info!(base, id, outcome = "unchanged", "record was not changed");
        return Ok(RecordOutcome::Unchanged);
    }

    let patch = RecordPatch::between_records(original, updated);
    info!(base, id, prev = ?patch.prev, next = ?patch.next, "record has changed");

    if recent.was_recently_applied(base, id, &patch) {
        info!(base, id, outcome = "suppressed", "same change was saved recently, skipping");
        return Ok(RecordOutcome::Suppressed);
    }

    if dry_run {
        info!(base, id, outcome = "dry_run", "no-operation is set, not saving record");
        return Ok(RecordOutcome::DryRun);
    }

    store.save_record(base, id, updated).await?;
    recent.record(base, id, &patch);
    info!(base, id, outcome = "saved", "record saved");
    Ok(RecordOutcome::Saved)
}
