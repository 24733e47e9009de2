//! Routing of change batches to the synchronization flows.

use crate::auth_sync::{AuthorityChangeReport, AuthoritySync};
use crate::bib_sync::{BibChangeReport, BibliographicSync};
use crate::change::Change;
use crate::config::{ChangeHandler, SyncConfig};
use crate::error::{Result, SyncError};
use crate::recent_changes::RecentChanges;
use crate::store::{LinkedRecordFinder, RecordStore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of handling one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReport {
    /// Handled as an authority change
    Authority(AuthorityChangeReport),
    /// Handled as a bibliographic change
    Bibliographic(BibChangeReport),
    /// No handler is configured for the library
    Unrouted,
}

/// Result of handling a batch of changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Changes that were handled, in batch order
    pub handled: Vec<(Change, ChangeReport)>,
    /// Changes that failed with a non-system error
    pub failed: Vec<(Change, SyncError)>,
}

impl BatchReport {
    /// Number of changes in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handled.len() + self.failed.len()
    }

    /// Whether the batch was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Routes changes to [`AuthoritySync`] or [`BibliographicSync`] by library.
///
/// Both flows share one [`RecentChanges`] cache, so a write by either flow
/// suppresses its own echo on the change feed.
#[derive(Debug)]
pub struct ChangeDispatcher<S: ?Sized, F: ?Sized> {
    config: Arc<SyncConfig>,
    recent: Arc<RecentChanges>,
    authority: AuthoritySync<S, F>,
    bibliographic: BibliographicSync<S>,
}

impl<S, F> ChangeDispatcher<S, F>
where
    S: RecordStore + ?Sized,
    F: LinkedRecordFinder + ?Sized,
{
    /// Build both flows from one configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the configuration does not validate.
    pub fn new(config: SyncConfig, store: Arc<S>, finder: Arc<F>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let recent = Arc::new(RecentChanges::new(config.cooldown()));
        let authority = AuthoritySync::new(Arc::clone(&store), finder, Arc::clone(&config), Arc::clone(&recent));
        let bibliographic = BibliographicSync::new(store, Arc::clone(&config), Arc::clone(&recent))?;
        Ok(ChangeDispatcher {
            config,
            recent,
            authority,
            bibliographic,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The shared loop suppression cache.
    #[must_use]
    pub fn recent_changes(&self) -> &Arc<RecentChanges> {
        &self.recent
    }

    /// Handle one change.
    ///
    /// # Errors
    ///
    /// Propagates the error of the flow handling the change.
    pub async fn dispatch_one(&self, change: &Change) -> Result<ChangeReport> {
        match self.config.handler_for(&change.library) {
            Some(ChangeHandler::Authority) => {
                Ok(ChangeReport::Authority(self.authority.handle_authority_change(change).await?))
            }
            Some(ChangeHandler::Bibliographic) => Ok(ChangeReport::Bibliographic(
                self.bibliographic.handle_bibliographic_change(change).await?,
            )),
            None => {
                warn!(library = %change.library, "could not find handler for base");
                Ok(ChangeReport::Unrouted)
            }
        }
    }

    /// Handle a batch in order.
    ///
    /// A failing change is logged and the batch continues, except for
    /// system-level errors, which stop the batch.
    ///
    /// # Errors
    ///
    /// Returns the first system-level error.
    pub async fn dispatch(&self, changes: &[Change]) -> Result<BatchReport> {
        if changes.is_empty() {
            debug!("no changes");
            return Ok(BatchReport::default());
        }
        info!(count = changes.len(), "handling changes");
        self.recent.purge(std::time::Instant::now());

        let mut report = BatchReport::default();
        for change in changes {
            match self.dispatch_one(change).await {
                Ok(handled) => report.handled.push((change.clone(), handled)),
                Err(e) if e.is_system() => {
                    error!(library = %change.library, record_id = %change.record_id, error = %e, "system error, aborting batch");
                    return Err(e);
                }
                Err(e) => {
                    error!(library = %change.library, record_id = %change.record_id, kind = e.kind_name(), error = %e, "change failed");
                    report.failed.push((change.clone(), e));
                }
            }
        }
        Ok(report)
    }
}
