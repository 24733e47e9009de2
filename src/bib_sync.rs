//! Refreshing the headings of a changed bibliographic record.
//!
//! Every name field of the record that links to a supported authority base
//! through `$0` gets its authorized portion rewritten from that authority's
//! heading. A field that cannot be updated (malformed or ambiguous links, an
//! authority of the wrong shape, punctuation without rules) is left as it was
//! and reported; the remaining fields are still processed.

use crate::auth_sync::authority_heading_portion;
use crate::authorized_portion::RecordKind;
use crate::change::{commit_update, Change, RecordOutcome};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::link::LinkParser;
use crate::portion_merge::merge_authorized_portion;
use crate::punctuation::Punctuator;
use crate::recent_changes::RecentChanges;
use crate::record::Field;
use crate::record_helpers::RecordHelpers;
use crate::store::RecordStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Tags of bibliographic fields kept in sync with agent authorities.
pub const LINKABLE_TAGS: [&str; 9] = ["100", "110", "111", "600", "610", "611", "700", "710", "711"];

/// A field that was left unchanged because updating it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Tag of the field
    pub tag: String,
    /// Position of the field among the record's data fields
    pub index: usize,
    /// Error message
    pub message: String,
    /// Short error kind, see [`SyncError::kind_name`]
    pub kind: &'static str,
}

/// Result of handling one bibliographic change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BibChangeReport {
    /// What happened to the record
    pub outcome: RecordOutcome,
    /// Fields that were left unchanged because of an error
    pub field_errors: Vec<FieldError>,
}

/// Orchestrates bibliographic changes.
#[derive(Debug)]
pub struct BibliographicSync<S: ?Sized> {
    store: Arc<S>,
    config: Arc<SyncConfig>,
    recent: Arc<RecentChanges>,
    parser: LinkParser,
    punctuator: Punctuator,
}

impl<S: RecordStore + ?Sized> BibliographicSync<S> {
    /// Create an orchestrator with the built-in bibliographic punctuation table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the link grammars cannot be built.
    pub fn new(store: Arc<S>, config: Arc<SyncConfig>, recent: Arc<RecentChanges>) -> Result<Self> {
        let parser = LinkParser::new(config.links.clone())?;
        Ok(BibliographicSync {
            store,
            config,
            recent,
            parser,
            punctuator: Punctuator::for_kind(RecordKind::Bibliographic),
        })
    }

    /// Replace the punctuator.
    #[must_use]
    pub fn with_punctuator(mut self, punctuator: Punctuator) -> Self {
        self.punctuator = punctuator;
        self
    }

    /// Refresh the linked headings of a changed bibliographic record.
    ///
    /// # Errors
    ///
    /// Fails when the record cannot be loaded or a system-level store error
    /// occurs. Per-field failures and rejected saves are reported in the result.
    pub async fn handle_bibliographic_change(&self, change: &Change) -> Result<BibChangeReport> {
        let span = info_span!("change", library = %change.library, record_id = %change.record_id);
        self.refresh(change).instrument(span).await
    }

    async fn refresh(&self, change: &Change) -> Result<BibChangeReport> {
        let (base, id) = (change.library.as_str(), change.record_id.as_str());
        debug!("handling changed bibliographic record");
        let record = self.store.load_record(base, id).await?;

        if record.is_deleted() {
            info!(base, id, outcome = "deleted", "record is deleted, skipping");
            return Ok(BibChangeReport {
                outcome: RecordOutcome::Deleted,
                field_errors: Vec::new(),
            });
        }

        let mut updated = record.clone();
        let mut field_errors = Vec::new();
        for (index, field) in updated.fields.iter_mut().enumerate() {
            if !LINKABLE_TAGS.contains(&field.tag.as_str()) || !field.has_subfield('0') {
                continue;
            }
            match self.update_field(field).await {
                Ok(Some(merged)) => *field = merged,
                Ok(None) => {}
                Err(e) if e.is_system() => return Err(e),
                Err(e) => {
                    warn!(tag = %field.tag, index, kind = e.kind_name(), error = %e, "leaving field unchanged");
                    field_errors.push(FieldError {
                        tag: field.tag.clone(),
                        index,
                        message: e.to_string(),
                        kind: e.kind_name(),
                    });
                }
            }
        }

        let committed = commit_update(
            &*self.store,
            &self.recent,
            base,
            id,
            &record,
            &updated,
            self.config.bib_change_dry_run(),
        )
        .await;
        let outcome = match committed {
            Ok(outcome) => outcome,
            Err(e) if e.is_system() => return Err(e.into()),
            Err(e) => {
                error!(base, id, error = %e, outcome = "failed", "saving record failed");
                RecordOutcome::Failed(e.to_string())
            }
        };

        Ok(BibChangeReport { outcome, field_errors })
    }

    /// The field with its heading refreshed, or `None` when it links to no
    /// supported base.
    async fn update_field(&self, field: &Field) -> Result<Option<Field>> {
        let Some(link) = self.parser.supported_link(field)? else {
            return Ok(None);
        };
        let store_base = self
            .config
            .links
            .base_map
            .get(&link.base)
            .ok_or_else(|| SyncError::Config(format!("no store base for link base {}", link.base)))?;

        debug!(base = %store_base, id = %link.id, "loading linked authority record");
        let authority = self.store.load_record(store_base, &link.id).await?;
        let portion = authority_heading_portion(&authority, store_base, &link.id)?;

        let mut merged = merge_authorized_portion(field, RecordKind::Bibliographic, &portion)?;
        self.punctuator.punctuate(&mut merged)?;
        Ok(Some(merged))
    }
}
