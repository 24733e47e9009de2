//! Record-level predicates and clean-up helpers.
//!
//! This module provides the `RecordHelpers` trait, which adds the record
//! queries the synchronization flows depend on: deletion status, agent
//! heading lookup, and duplicate field merging.
//!
//! # Examples
//!
//! ```ignore
//! use heading_sync::{Record, RecordHelpers};
//!
//! let record = Record::from_text("LDR    00000dz  a2200000n  4500")?;
//! assert!(record.is_deleted());
//! ```

use crate::record::{Field, Record};

/// Tags of agent (name) heading fields in an authority record.
pub const AGENT_HEADING_TAGS: [&str; 3] = ["100", "110", "111"];

/// Extension trait providing record-level helpers.
pub trait RecordHelpers {
    /// Whether the record is marked deleted
    ///
    /// A record is deleted when leader position 5 is `d`, when it carries a
    /// `DEL` field, or when a `STA` field has `$a DELETED`.
    fn is_deleted(&self) -> bool;

    /// Agent heading fields (100/110/111) in record order
    fn agent_heading_fields(&self) -> Vec<&Field>;

    /// Whether the record is an agent authority
    ///
    /// True when at least one agent heading field exists and none of them
    /// carries a title (`$t`).
    fn is_agent_authority(&self) -> bool;

    /// The record identifier from field 001
    fn control_number(&self) -> Option<&str>;

    /// Collapse fields that are identical apart from `$5` and `$9`
    ///
    /// Each group of duplicates is replaced by its first member with the
    /// distinct `$5`/`$9` subfields of the later members appended. `CAT`
    /// fields are never merged.
    #[must_use]
    fn merge_duplicate_fields(&self) -> Record;
}

impl RecordHelpers for Record {
    fn is_deleted(&self) -> bool {
        if self.leader.chars().nth(5) == Some('d') {
            return true;
        }
        self.fields.iter().any(|f| {
            f.tag == "DEL" || (f.tag == "STA" && f.subfields_by_code('a').any(|v| v == "DELETED"))
        })
    }

    fn agent_heading_fields(&self) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| AGENT_HEADING_TAGS.contains(&f.tag.as_str()))
            .collect()
    }

    fn is_agent_authority(&self) -> bool {
        let headings = self.agent_heading_fields();
        !headings.is_empty() && headings.iter().all(|f| !f.has_subfield('t'))
    }

    fn control_number(&self) -> Option<&str> {
        self.get_control_field("001")
    }

    fn merge_duplicate_fields(&self) -> Record {
        let mut merged: Vec<Field> = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            let target = merged
                .last_mut()
                .filter(|prev| is_duplicate(prev, field));

            match target {
                Some(prev) => {
                    for sf in field.subfields().filter(|sf| is_local_code(sf.code)) {
                        if !prev.subfields.contains(sf) {
                            prev.subfields.push(sf.clone());
                        }
                    }
                }
                None => merged.push(field.clone()),
            }
        }

        Record {
            leader: self.leader.clone(),
            control_fields: self.control_fields.clone(),
            fields: merged,
        }
    }
}

fn is_local_code(code: char) -> bool {
    matches!(code, '5' | '9')
}

fn is_duplicate(a: &Field, b: &Field) -> bool {
    if a.tag == "CAT" {
        return false;
    }
    a.tag == b.tag
        && a.indicator1 == b.indicator1
        && a.indicator2 == b.indicator2
        && a.subfields()
            .filter(|sf| !is_local_code(sf.code))
            .eq(b.subfields().filter(|sf| !is_local_code(sf.code)))
}
