//! Propagation of a changed authority heading to linked records.
//!
//! When an agent authority record changes, every bibliographic record in the
//! bibliographic base and every authority record in the agent base that links
//! to it gets its authorized portion rewritten from the authority's heading.
//! Linked records are processed one at a time; a failure on one is logged and
//! reported without stopping the others.

use crate::authorized_portion::{resolve_authorized_portion, AuthorizedPortion, RecordKind};
use crate::change::{commit_update, Change, RecordOutcome, RecordReport};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::link::ChangeLinkMatcher;
use crate::portion_merge::merge_authorized_portion;
use crate::punctuation::Punctuator;
use crate::recent_changes::RecentChanges;
use crate::record::Record;
use crate::record_helpers::RecordHelpers;
use crate::store::{LinkedRecordFinder, RecordStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

/// The authorized portion of an agent authority record.
///
/// # Errors
///
/// - [`SyncError::AmbiguousAuthority`] unless the record has exactly one
///   100/110/111 field
/// - errors from [`resolve_authorized_portion`]
pub fn authority_heading_portion(record: &Record, base: &str, id: &str) -> Result<AuthorizedPortion> {
    match record.agent_heading_fields().as_slice() {
        [heading] => resolve_authorized_portion(heading, RecordKind::Authority),
        headings => Err(SyncError::AmbiguousAuthority {
            base: base.to_string(),
            id: id.to_string(),
            candidates: headings.len(),
        }),
    }
}

/// Result of handling one authority change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorityChangeReport {
    /// The changed authority itself was deleted; nothing was propagated
    pub authority_deleted: bool,
    /// One entry per linked record, bibliographic records first
    pub records: Vec<RecordReport>,
}

impl AuthorityChangeReport {
    /// Linked records with the given outcome.
    pub fn with_outcome<'a>(&'a self, outcome: &'a RecordOutcome) -> impl Iterator<Item = &'a RecordReport> {
        self.records.iter().filter(move |r| &r.outcome == outcome)
    }

    /// Linked records that failed.
    pub fn failures(&self) -> impl Iterator<Item = &RecordReport> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Failed(_)))
    }
}

/// Orchestrates authority changes.
#[derive(Debug)]
pub struct AuthoritySync<S: ?Sized, F: ?Sized> {
    store: Arc<S>,
    finder: Arc<F>,
    config: Arc<SyncConfig>,
    recent: Arc<RecentChanges>,
    bib_punctuator: Punctuator,
    auth_punctuator: Punctuator,
}

impl<S, F> AuthoritySync<S, F>
where
    S: RecordStore + ?Sized,
    F: LinkedRecordFinder + ?Sized,
{
    /// Create an orchestrator with the built-in punctuation tables.
    pub fn new(store: Arc<S>, finder: Arc<F>, config: Arc<SyncConfig>, recent: Arc<RecentChanges>) -> Self {
        AuthoritySync {
            store,
            finder,
            config,
            recent,
            bib_punctuator: Punctuator::for_kind(RecordKind::Bibliographic),
            auth_punctuator: Punctuator::for_kind(RecordKind::Authority),
        }
    }

    /// Replace the punctuators for bibliographic and authority records.
    #[must_use]
    pub fn with_punctuators(mut self, bibliographic: Punctuator, authority: Punctuator) -> Self {
        self.bib_punctuator = bibliographic;
        self.auth_punctuator = authority;
        self
    }

    /// Propagate the heading of a changed authority record.
    ///
    /// # Errors
    ///
    /// Fails when the changed authority cannot be loaded, has no single
    /// resolvable heading, or the linked-record query fails. Failures on
    /// individual linked records are reported in the result, except
    /// system-level store errors, which abort the change.
    pub async fn handle_authority_change(&self, change: &Change) -> Result<AuthorityChangeReport> {
        let span = info_span!("change", library = %change.library, record_id = %change.record_id);
        self.propagate(change).instrument(span).await
    }

    async fn propagate(&self, change: &Change) -> Result<AuthorityChangeReport> {
        info!("handling changed authority record");
        let authority = self.store.load_record(&change.library, &change.record_id).await?;

        if authority.is_deleted() {
            info!(base = %change.library, id = %change.record_id, outcome = "deleted", "record is deleted, skipping");
            return Ok(AuthorityChangeReport {
                authority_deleted: true,
                records: Vec::new(),
            });
        }

        let portion = authority_heading_portion(&authority, &change.library, &change.record_id)?;
        debug!(tag = %portion.tag, subfields = portion.subfields.len(), "resolved authorized portion");

        let matcher = ChangeLinkMatcher::new(&self.config.links, &change.library, &change.record_id);
        let targets = [
            (&self.config.bib_record_base, RecordKind::Bibliographic, &self.bib_punctuator),
            (&self.config.agent_record_base, RecordKind::Authority, &self.auth_punctuator),
        ];

        let mut report = AuthorityChangeReport::default();
        for (base, kind, punctuator) in targets {
            let ids = self.finder.find_linked_records(base, &change.record_id).await?;
            debug!(base = %base, count = ids.len(), "found linked records");

            for id in ids {
                let outcome = match self.update_linked(base, &id, kind, punctuator, &portion, &matcher).await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_system() => return Err(e),
                    Err(e) => {
                        error!(base = %base, id = %id, kind = e.kind_name(), error = %e, outcome = "failed", "updating linked record failed");
                        RecordOutcome::Failed(e.to_string())
                    }
                };
                report.records.push(RecordReport {
                    base: base.clone(),
                    id,
                    outcome,
                });
            }
        }

        Ok(report)
    }

    async fn update_linked(
        &self,
        base: &str,
        id: &str,
        kind: RecordKind,
        punctuator: &Punctuator,
        portion: &AuthorizedPortion,
        matcher: &ChangeLinkMatcher,
    ) -> Result<RecordOutcome> {
        let record = self.store.load_record(base, id).await?;
        if record.is_deleted() {
            info!(base, id, outcome = "deleted", "record is deleted, skipping");
            return Ok(RecordOutcome::Deleted);
        }

        let mut updated = record.clone();
        for field in updated.fields_mut() {
            if !matcher.matches(field) {
                continue;
            }
            let mut merged = merge_authorized_portion(field, kind, portion)?;
            punctuator.punctuate(&mut merged)?;
            debug!(before = %field, after = %merged, "updated linked field");
            *field = merged;
        }

        let outcome = commit_update(
            &*self.store,
            &self.recent,
            base,
            id,
            &record,
            &updated,
            self.config.no_operation,
        )
        .await?;
        Ok(outcome)
    }
}
