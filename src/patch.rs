//! Field-level difference between two versions of a record.

use crate::record::{Field, Record};
use serde::{Deserialize, Serialize};

/// Fields removed from and added to a record, in text encoding.
///
/// Fields present in both versions are left out, so a patch only names what
/// changed. Its JSON form is part of the loop suppression key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    /// Fields only in the previous version
    pub prev: Vec<String>,
    /// Fields only in the next version
    pub next: Vec<String>,
}

impl RecordPatch {
    /// Diff two field lists, keeping each side in record order.
    #[must_use]
    pub fn between(prev: &[Field], next: &[Field]) -> Self {
        let only_in = |side: &[Field], other: &[Field]| -> Vec<String> {
            side.iter()
                .filter(|f| !other.contains(f))
                .map(ToString::to_string)
                .collect()
        };
        RecordPatch {
            prev: only_in(prev, next),
            next: only_in(next, prev),
        }
    }

    /// Diff the data fields of two records.
    #[must_use]
    pub fn between_records(prev: &Record, next: &Record) -> Self {
        Self::between(&prev.fields, &next.fields)
    }

    /// Whether no field differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prev.is_empty() && self.next.is_empty()
    }
}
