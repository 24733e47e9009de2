#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # heading-sync
//!
//! Keeps name headings in catalog records in step with the authority records
//! they link to.
//!
//! ## Quick Start
//!
//! ### Resolving and merging an authorized portion
//!
//! ```
//! use heading_sync::{merge_authorized_portion, resolve_authorized_portion, Field, RecordKind};
//!
//! # fn main() -> heading_sync::Result<()> {
//! let authority: Field = "100 0  ‡aNimi,‡d1922-1999".parse()?;
//! let portion = resolve_authorized_portion(&authority, RecordKind::Authority)?;
//!
//! let bib: Field = "700 1  ‡aToinen Nimi‡0(TST10)1234".parse()?;
//! let merged = merge_authorized_portion(&bib, RecordKind::Bibliographic, &portion)?;
//! assert_eq!(merged.to_string(), "700 0  ‡aNimi,‡d1922-1999‡0(TST10)1234");
//! # Ok(())
//! # }
//! ```
//!
//! ### Repairing punctuation
//!
//! ```
//! use heading_sync::{Field, Punctuator, RecordKind};
//!
//! # fn main() -> heading_sync::Result<()> {
//! let mut field: Field = "100 1  ‡aRosberg, Harri‡d1946-".parse()?;
//! Punctuator::for_kind(RecordKind::Authority).punctuate(&mut field)?;
//! assert_eq!(field.to_string(), "100 1  ‡aRosberg, Harri,‡d1946-");
//! # Ok(())
//! # }
//! ```
//!
//! ### Handling changes
//!
//! ```ignore
//! use heading_sync::{Change, ChangeDispatcher, SyncConfig};
//! use std::sync::Arc;
//!
//! let config = SyncConfig::from_file("heading-sync.toml")?;
//! let dispatcher = ChangeDispatcher::new(config, Arc::new(store), Arc::new(finder))?;
//! let report = dispatcher.dispatch(&[Change::new("FIN11", "000090001")]).await?;
//! ```
//!
//! ## Modules
//!
//! - [`record`] — Record structures (`Record`, `Field`, `Subfield`) and the text encoding
//! - [`record_helpers`] — Record-level predicates and clean-up
//! - [`authorized_portion`] — Classification of heading sub-elements
//! - [`portion_merge`] — Rewriting a heading from an authority's authorized portion
//! - [`punctuation`] — Rule-driven punctuation repair
//! - [`link`] — `$0` link parsing and matching
//! - [`patch`] — Field-level record differences
//! - [`recent_changes`] — Loop suppression of the service's own writes
//! - [`store`] — Record store and index collaborators
//! - [`config`] — Settings loaded from TOML
//! - [`change`] — Changes and per-record outcomes
//! - [`auth_sync`] — Authority change propagation
//! - [`bib_sync`] — Bibliographic change handling
//! - [`dispatcher`] — Routing change batches
//! - [`heading_query`] — Heading normalization for bulk linking
//! - [`error`] — Error types and result type

pub mod auth_sync;
pub mod authorized_portion;
pub mod bib_sync;
pub mod change;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod heading_query;
pub mod link;
pub mod patch;
pub mod portion_merge;
pub mod punctuation;
pub mod recent_changes;
/// Record structures (`Record`, `Field`, `Subfield`) and the text encoding
pub mod record;
pub mod record_helpers;
pub mod store;

pub use auth_sync::{authority_heading_portion, AuthorityChangeReport, AuthoritySync};
pub use authorized_portion::{
    resolve_authorized_portion, AuthorizedPortion, NameKind, PortionRange, RecordKind, SubfieldRun,
};
pub use bib_sync::{BibChangeReport, BibliographicSync, FieldError};
pub use change::{Change, RecordOutcome, RecordReport};
pub use config::{ChangeHandler, SyncConfig};
pub use dispatcher::{BatchReport, ChangeDispatcher, ChangeReport};
pub use error::{Result, StoreError, StoreErrorKind, SyncError};
pub use heading_query::{
    heading_terms, normalize_for_heading_query, select_authority_fields_for_linking, select_fields_for_linking,
};
pub use link::{ChangeLinkMatcher, LinkConfig, LinkParser, LinkReference};
pub use patch::RecordPatch;
pub use portion_merge::merge_authorized_portion;
pub use punctuation::{Punctuator, RuleTable};
pub use recent_changes::RecentChanges;
pub use record::{Field, Record, Subfield};
pub use record_helpers::RecordHelpers;
pub use store::{IndexQuery, LinkedRecordFinder, PagedIndexFinder, RecordStore, SaveAck};
