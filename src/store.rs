//! Collaborator contracts for record storage and index queries.
//!
//! The synchronization flows never talk to a catalog directly. They load and
//! save records through a [`RecordStore`] and resolve "records linked to
//! authority X" through a [`LinkedRecordFinder`]. Both are async traits so
//! network-backed clients can implement them; failures are reported as
//! [`StoreError`] and classified by [`StoreError::is_system`].
//!
//! [`PagedIndexFinder`] implements [`LinkedRecordFinder`] on top of a lower
//! level [`IndexQuery`] client that speaks a find/present protocol: a find
//! request returns a result set descriptor and present requests page through
//! its entries.

use crate::error::StoreError;
use crate::link::pad_id;
use crate::record::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Index of bibliographic and authority records by linked agent authority.
pub const AGENT_LINK_INDEX: &str = "ANAID";

/// Index of records by linked subject authority.
pub const SUBJECT_LINK_INDEX: &str = "ASAID";

/// Default number of entries fetched per present request.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Acknowledgement of a saved record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAck {
    /// Store-provided message, if any
    pub message: Option<String>,
}

/// Loads and saves records by base and identifier.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a record.
    async fn load_record(&self, base: &str, id: &str) -> Result<Record, StoreError>;

    /// Save a record, replacing the stored version.
    async fn save_record(&self, base: &str, id: &str, record: &Record) -> Result<SaveAck, StoreError>;
}

/// Resolves the records of a base that link to an authority record.
#[async_trait]
pub trait LinkedRecordFinder: Send + Sync {
    /// Identifiers of records in `base` linked to `authority_id`, in index order.
    async fn find_linked_records(&self, base: &str, authority_id: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn load_record(&self, base: &str, id: &str) -> Result<Record, StoreError> {
        (**self).load_record(base, id).await
    }

    async fn save_record(&self, base: &str, id: &str, record: &Record) -> Result<SaveAck, StoreError> {
        (**self).save_record(base, id, record).await
    }
}

#[async_trait]
impl<T: LinkedRecordFinder + ?Sized> LinkedRecordFinder for Arc<T> {
    async fn find_linked_records(&self, base: &str, authority_id: &str) -> Result<Vec<String>, StoreError> {
        (**self).find_linked_records(base, authority_id).await
    }
}

// ============================================================================
// Find/present index protocol
// ============================================================================

/// Descriptor of a find result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Handle used by present requests
    pub set_number: String,
    /// Number of entries in the set
    pub no_entries: usize,
    /// Session token of the find response
    pub session_id: Option<String>,
}

/// One page of a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentPage {
    /// Record identifiers in index order
    pub record_ids: Vec<String>,
    /// Session token of the present response
    pub session_id: Option<String>,
}

/// Low-level find/present index client.
#[async_trait]
pub trait IndexQuery: Send + Sync {
    /// Run `request` (such as `ANAID=000090001`) against `base`.
    async fn find(&self, base: &str, request: &str) -> Result<ResultSet, StoreError>;

    /// Fetch entries `first..=last` (1-based) of a result set.
    async fn present(&self, set_number: &str, first: usize, last: usize) -> Result<PresentPage, StoreError>;
}

/// Record identifiers gathered from every page of a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedRecords {
    /// Identifiers from all pages, concatenated in order
    pub record_ids: Vec<String>,
    /// Session token of the last page, kept for diagnostics
    pub session_id: Option<String>,
}

/// [`LinkedRecordFinder`] over an [`IndexQuery`] client.
#[derive(Debug, Clone)]
pub struct PagedIndexFinder<Q> {
    query: Q,
    index: String,
    page_size: usize,
}

impl<Q: IndexQuery> PagedIndexFinder<Q> {
    /// Finder over the agent link index with the default page size.
    pub fn new(query: Q) -> Self {
        PagedIndexFinder {
            query,
            index: AGENT_LINK_INDEX.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Query a different index, such as [`SUBJECT_LINK_INDEX`].
    #[must_use]
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    /// Fetch at most `page_size` entries per present request.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Find linked records, keeping the last session token.
    ///
    /// The authority id is zero-padded to nine digits before querying.
    ///
    /// # Errors
    ///
    /// Propagates the first error of the find or any present request.
    pub async fn find_all(&self, base: &str, authority_id: &str) -> Result<LinkedRecords, StoreError> {
        let request = format!("{}={}", self.index, pad_id(authority_id));
        debug!(base, request = %request, "finding linked records");

        let set = self.query.find(base, &request).await?;
        let mut linked = LinkedRecords {
            record_ids: Vec::with_capacity(set.no_entries),
            session_id: set.session_id.clone(),
        };

        let mut first = 1;
        while first <= set.no_entries {
            let last = first.saturating_add(self.page_size - 1).min(set.no_entries);
            let page = self.query.present(&set.set_number, first, last).await?;
            debug!(first, last, found = page.record_ids.len(), "fetched result page");
            linked.record_ids.extend(page.record_ids);
            linked.session_id = page.session_id;
            if last == set.no_entries {
                break;
            }
            first = last + 1;
        }

        Ok(linked)
    }
}

#[async_trait]
impl<Q: IndexQuery> LinkedRecordFinder for PagedIndexFinder<Q> {
    async fn find_linked_records(&self, base: &str, authority_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.find_all(base, authority_id).await?.record_ids)
    }
}
