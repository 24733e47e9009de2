//! Authorized portion resolution for name heading fields.
//!
//! A name heading field (100/110/111 and their 4XX/5XX/6XX/7XX/8XX series)
//! splits into up to three contiguous runs of subfields:
//!
//! - the **authorized portion**, the controlled name itself
//! - the **specifier**, qualifiers such as dates or numbering that corporate
//!   and meeting names carry separately from the name text
//! - the **title portion**, subfields at or after the first `$t`
//!
//! Everything else (relator terms, control and link codes) lies outside all
//! three runs. Classification depends on the name kind, which is derived
//! from the last two digits of the tag, and on the record kind, which decides
//! which tag series are linkable.
//!
//! # Examples
//!
//! ```ignore
//! use heading_sync::{Field, RecordKind, resolve_authorized_portion};
//!
//! let field: Field = "110 2  ‡aKerho‡bJaosto‡c(Helsinki)‡0(TST10)1".parse()?;
//! let portion = resolve_authorized_portion(&field, RecordKind::Authority)?;
//! assert_eq!(portion.range.start, 0);
//! assert_eq!(portion.range.length, 2);
//! assert_eq!(portion.specifier.unwrap().subfields[0].value, "(Helsinki)");
//! ```

use crate::error::{Result, SyncError};
use crate::record::{Field, Subfield};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of the record a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Authority record
    Authority,
    /// Bibliographic record
    Bibliographic,
}

impl RecordKind {
    /// Tag series (first tag digit) that carry linkable name headings.
    #[must_use]
    pub fn heading_series(self) -> &'static [char] {
        match self {
            RecordKind::Authority => &['1', '4', '5', '7'],
            RecordKind::Bibliographic => &['1', '6', '7', '8'],
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Authority => f.write_str("authority"),
            RecordKind::Bibliographic => f.write_str("bibliographic"),
        }
    }
}

/// Kind of name a heading field carries, from the last two tag digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// X00 personal name
    Personal,
    /// X10 corporate name
    Corporate,
    /// X11 meeting name
    Meeting,
}

impl NameKind {
    /// Derive the name kind from a tag, if the tag is a name heading.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.get(1..) {
            Some("00") => Some(NameKind::Personal),
            Some("10") => Some(NameKind::Corporate),
            Some("11") => Some(NameKind::Meeting),
            _ => None,
        }
    }

    fn is_authorized(self, code: char) -> bool {
        match self {
            NameKind::Personal => matches!(code, 'a' | 'b' | 'c' | 'd' | 'g' | 'h' | 'j' | 'q'),
            NameKind::Corporate => matches!(code, 'a' | 'b'),
            NameKind::Meeting => matches!(code, 'a' | 'e' | 'q'),
        }
    }

    fn is_specifier(self, code: char) -> bool {
        match self {
            NameKind::Personal => false,
            NameKind::Corporate | NameKind::Meeting => matches!(code, 'c' | 'd' | 'g' | 'n'),
        }
    }

    fn is_title(self, code: char) -> bool {
        let common = matches!(
            code,
            'f' | 'g' | 'h' | 'k' | 'l' | 'm' | 'n' | 'o' | 'p' | 'r' | 's' | 't' | 'v' | 'x' | 'y' | 'z'
        );
        match self {
            NameKind::Personal => common,
            NameKind::Corporate | NameKind::Meeting => common || code == 'd',
        }
    }
}

/// Whether a subfield code is a control or link code (`$0`-`$9`).
#[must_use]
pub fn is_control_code(code: char) -> bool {
    code.is_ascii_digit()
}

/// A half-open index range over a field's subfields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortionRange {
    /// Index of the first subfield in the range
    pub start: usize,
    /// Number of subfields in the range
    pub length: usize,
}

impl PortionRange {
    /// Index one past the last subfield in the range.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// A contiguous run of subfields copied out of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubfieldRun {
    /// Copies of the subfields in the run
    pub subfields: Vec<Subfield>,
    /// Position of the run in the field it was resolved from
    pub range: PortionRange,
}

impl SubfieldRun {
    /// Whether the run carries a subfield with this code.
    #[must_use]
    pub fn has_code(&self, code: char) -> bool {
        self.subfields.iter().any(|sf| sf.code == code)
    }
}

/// The authorized portion of a name heading field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedPortion {
    /// Tag of the field the portion was resolved from
    pub tag: String,
    /// First indicator of that field
    pub indicator1: char,
    /// Copies of the authorized subfields
    pub subfields: Vec<Subfield>,
    /// Position of the authorized subfields; empty when the field has none
    pub range: PortionRange,
    /// Specifier run, when the field carries one
    pub specifier: Option<SubfieldRun>,
    /// Title run, when the field carries one
    pub title_portion: Option<SubfieldRun>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Authorized,
    Specifier,
    Title,
    Other,
}

impl Class {
    fn label(self) -> &'static str {
        match self {
            Class::Authorized => "authorized",
            Class::Specifier => "specifier",
            Class::Title => "title",
            Class::Other => "other",
        }
    }
}

fn classify(name: NameKind, subfields: &[Subfield]) -> Vec<Class> {
    let first_title = subfields.iter().position(|sf| sf.code == 't');

    subfields
        .iter()
        .enumerate()
        .map(|(index, sf)| {
            let after_title = first_title.is_some_and(|t| index >= t);
            if after_title && name.is_title(sf.code) {
                Class::Title
            } else if name.is_specifier(sf.code) {
                Class::Specifier
            } else if name.is_authorized(sf.code) {
                Class::Authorized
            } else {
                Class::Other
            }
        })
        .collect()
}

fn contiguous_range(tag: &str, classes: &[Class], wanted: Class) -> Result<Option<PortionRange>> {
    let Some(first) = classes.iter().position(|c| *c == wanted) else {
        return Ok(None);
    };
    let last = classes.iter().rposition(|c| *c == wanted).unwrap_or(first);

    if let Some(offset) = classes[first..=last].iter().position(|c| *c != wanted) {
        return Err(SyncError::StructuralAmbiguity {
            tag: tag.to_string(),
            detail: format!(
                "{} subfields {}..={} are interrupted by {} subfield at {}",
                wanted.label(),
                first,
                last,
                classes[first + offset].label(),
                first + offset
            ),
        });
    }

    Ok(Some(PortionRange {
        start: first,
        length: last - first + 1,
    }))
}

fn run(subfields: &[Subfield], range: Option<PortionRange>) -> Option<SubfieldRun> {
    range.map(|range| SubfieldRun {
        subfields: subfields[range.start..range.end()].to_vec(),
        range,
    })
}

/// Resolve the name kind of a field for a record kind.
///
/// # Errors
///
/// Returns [`SyncError::UnsupportedTag`] when the tag is not a personal,
/// corporate or meeting name heading in a series the record kind links.
pub fn heading_name_kind(tag: &str, kind: RecordKind) -> Result<NameKind> {
    let series_ok = tag
        .chars()
        .next()
        .is_some_and(|c| kind.heading_series().contains(&c));

    match NameKind::from_tag(tag) {
        Some(name) if series_ok && tag.len() == 3 => Ok(name),
        _ => Err(SyncError::UnsupportedTag {
            tag: tag.to_string(),
            kind: kind.to_string(),
        }),
    }
}

/// Resolve the authorized portion, specifier and title portion of a field.
///
/// The field is not modified; the result holds copies of the subfields.
///
/// When the field has no authorized subfields the range is empty and sits
/// where a heading would be inserted: before the specifier or title run if
/// there is one, otherwise before the first subfield other than `$6`/`$8`.
///
/// # Errors
///
/// - [`SyncError::UnsupportedTag`] if the tag has no classification
/// - [`SyncError::StructuralAmbiguity`] if any of the three runs is interrupted
///   by a differently classified subfield
pub fn resolve_authorized_portion(field: &Field, kind: RecordKind) -> Result<AuthorizedPortion> {
    let name = heading_name_kind(&field.tag, kind)?;
    let subfields = field.subfields.as_slice();
    let classes = classify(name, subfields);

    let title_range = contiguous_range(&field.tag, &classes, Class::Title)?;
    let specifier_range = contiguous_range(&field.tag, &classes, Class::Specifier)?;
    let authorized_range = contiguous_range(&field.tag, &classes, Class::Authorized)?;

    let range = authorized_range.unwrap_or_else(|| {
        let start = [specifier_range, title_range]
            .iter()
            .flatten()
            .map(|r| r.start)
            .min()
            .or_else(|| subfields.iter().position(|sf| !matches!(sf.code, '6' | '8')))
            .unwrap_or(subfields.len());
        PortionRange { start, length: 0 }
    });

    Ok(AuthorizedPortion {
        tag: field.tag.clone(),
        indicator1: field.indicator1,
        subfields: subfields[range.start..range.end()].to_vec(),
        range,
        specifier: run(subfields, specifier_range),
        title_portion: run(subfields, title_range),
    })
}
