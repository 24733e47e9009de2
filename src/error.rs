//! Error types for heading synchronization.
//!
//! This module provides the [`SyncError`] type for all operations of the
//! crate, the [`StoreError`] type reported by record-store collaborators, and
//! the [`Result`] convenience type.

use std::fmt;

use thiserror::Error;

/// Error type for all heading synchronization operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A classified sub-element range of a field is not contiguous.
    #[error("Structural ambiguity in field {tag}: {detail}")]
    StructuralAmbiguity {
        /// Tag of the offending field.
        tag: String,
        /// Description of the offending range.
        detail: String,
    },

    /// The field tag has no classification rule for the record kind.
    #[error("Unsupported tag {tag} for {kind} record")]
    UnsupportedTag {
        /// Tag of the offending field.
        tag: String,
        /// Record kind the field was classified for.
        kind: String,
    },

    /// The punctuation rule table has no rule for a subfield code.
    #[error("Unknown subfield code {code} in field {tag}")]
    UnknownSubfieldCode {
        /// Tag of the offending field.
        tag: String,
        /// The unmatched subfield code.
        code: char,
    },

    /// A link subfield value matches none of the known link grammars.
    #[error("{}", invalid_link_message(.value, .expected_prefix.as_deref()))]
    InvalidLinkFormat {
        /// The raw link value.
        value: String,
        /// Resolver prefix expected for URL-shaped links.
        expected_prefix: Option<String>,
    },

    /// A resolver link names a URN namespace with no configured base.
    #[error("Found non-mapped URN in: {value} (namespace {namespace})")]
    UnmappedUrn {
        /// The raw link value.
        value: String,
        /// The unmapped URN namespace.
        namespace: String,
    },

    /// A field links to more than one distinct supported base.
    #[error(
        "Field contains multiple links to supported bases ({}). Unable to determine which one to use for updating the authorized portion.",
        .bases.join(", ")
    )]
    AmbiguousLink {
        /// The distinct supported bases linked from the field.
        bases: Vec<String>,
    },

    /// An authority record does not carry exactly one agent heading field.
    #[error("Could not parse authorized portion from authority record {base} / {id} ({candidates} heading fields)")]
    AmbiguousAuthority {
        /// Base of the authority record.
        base: String,
        /// Identifier of the authority record.
        id: String,
        /// Number of 100/110/111 fields found.
        candidates: usize,
    },

    /// No field of a record can be linked to the expected heading.
    #[error("Linking query failed: {0}")]
    LinkingQuery(String),

    /// Error indicating an invalid field in the text encoding.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Error indicating an invalid record in the text encoding.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Error reported by a record-store or index collaborator.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Error in configuration or rule table content.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn invalid_link_message(value: &str, expected_prefix: Option<&str>) -> String {
    match expected_prefix {
        Some(prefix) => format!(
            "Invalid format (url) in subfield 0: {value}. Not matching known URN pattern: {prefix}"
        ),
        None => format!("Invalid format in subfield 0: {value}"),
    }
}

impl SyncError {
    /// Returns `true` for failures of the surrounding system (connection
    /// loss, exhausted resources, timeouts) rather than of the data.
    ///
    /// System-level errors are never swallowed by per-record isolation.
    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, SyncError::Store(e) if e.is_system())
    }

    /// Short stable name of the error kind, used in outcome log lines.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SyncError::StructuralAmbiguity { .. } => "structural_ambiguity",
            SyncError::UnsupportedTag { .. } => "unsupported_tag",
            SyncError::UnknownSubfieldCode { .. } => "unknown_subfield_code",
            SyncError::InvalidLinkFormat { .. } => "invalid_link_format",
            SyncError::UnmappedUrn { .. } => "unmapped_urn",
            SyncError::AmbiguousLink { .. } => "ambiguous_link",
            SyncError::AmbiguousAuthority { .. } => "ambiguous_authority",
            SyncError::LinkingQuery(_) => "linking_query",
            SyncError::InvalidField(_) => "invalid_field",
            SyncError::InvalidRecord(_) => "invalid_record",
            SyncError::Store(e) => e.kind.name(),
            SyncError::Config(_) => "config",
        }
    }
}

/// Category of a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The requested record does not exist.
    NotFound,
    /// The store refused the request (validation, permissions, conflict).
    Rejected,
    /// The connection was refused or reset.
    Connection,
    /// The request timed out.
    Timeout,
    /// The host ran out of a resource such as file handles.
    ResourceExhausted,
    /// The response could not be understood.
    Protocol,
}

impl StoreErrorKind {
    fn name(self) -> &'static str {
        match self {
            StoreErrorKind::NotFound => "not_found",
            StoreErrorKind::Rejected => "rejected",
            StoreErrorKind::Connection => "connection",
            StoreErrorKind::Timeout => "timeout",
            StoreErrorKind::ResourceExhausted => "resource_exhausted",
            StoreErrorKind::Protocol => "protocol",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error reported by a record-store or find-index collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Store error ({kind}): {message}")]
pub struct StoreError {
    /// Failure category.
    pub kind: StoreErrorKind,
    /// Collaborator-provided detail.
    pub message: String,
}

impl StoreError {
    /// Creates a new store error.
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        StoreError {
            kind,
            message: message.into(),
        }
    }

    /// Returns `true` for connection, timeout and resource exhaustion failures.
    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::Connection | StoreErrorKind::Timeout | StoreErrorKind::ResourceExhausted
        )
    }
}

/// Convenience type alias for [`std::result::Result`] with [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;
