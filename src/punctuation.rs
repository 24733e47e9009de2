//! Rule-table driven punctuation of name heading fields.
//!
//! Headings carry punctuation between subfields that depends on which part of
//! the heading a subfield belongs to (name, title, subject subdivision) and on
//! the subfield that follows. The rules are data: a [`RuleTable`] maps a tag
//! selector and subfield code to a [`PunctuationRule`], and a [`Punctuator`]
//! walks a field left to right, repairing the value of each preceding
//! subfield in place.
//!
//! Applying the punctuator to its own output changes nothing.
//!
//! # Rule table format
//!
//! Custom tables load from JSON with [`RuleTable::from_json`]:
//!
//! ```json
//! [
//!   {"selector": "X10", "code": "c", "portion": "N", "preceding": "COMMA",
//!    "exceptions": [{"preceded_by": "c", "insert": "SEMICOLON"}]}
//! ]
//! ```
//!
//! `X` in a selector matches any single tag character.
//!
//! # Examples
//!
//! ```ignore
//! use heading_sync::{Field, Punctuator, RecordKind};
//!
//! let punctuator = Punctuator::for_kind(RecordKind::Authority);
//! let mut field: Field = "100 1  ‡aRosberg, Harri‡d1946-".parse()?;
//! punctuator.punctuate(&mut field)?;
//! assert_eq!(field.to_string(), "100 1  ‡aRosberg, Harri,‡d1946-");
//! ```

use crate::authorized_portion::RecordKind;
use crate::error::{Result, SyncError};
use crate::record::{Field, Subfield};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;
use ExceptionKind::{Colon, Semicolon};
use Portion::{ControlField, Name, NameOrTitle, NoPunctuation, Subject, Title};
use PrecedingPunctuation::{Comma, CondComma, None as NoMark, Period};

/// Part of a heading a subfield belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Portion {
    /// Name portion
    #[serde(rename = "N")]
    Name,
    /// Title portion
    #[serde(rename = "T")]
    Title,
    /// Subject subdivision
    #[serde(rename = "S")]
    Subject,
    /// Name while still in the name portion, title afterwards
    #[serde(rename = "NT")]
    NameOrTitle,
    /// Control or link subfield, never punctuated
    #[serde(rename = "CF")]
    ControlField,
    /// Subfield that is never punctuated
    #[serde(rename = "NC")]
    NoPunctuation,
}

/// Punctuation added to a subfield when the next subfield is in the same portion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrecedingPunctuation {
    /// Leave the preceding value alone
    None,
    /// Append `.` unless the value already ends in punctuation
    Period,
    /// Append `,` unless the value ends in `,` or the next value opens a bracket
    Comma,
    /// Append `,` unless the value ends in `,` or `-`
    CondComma,
}

/// Mark inserted by a [`PunctuationException`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionKind {
    /// ` ;`
    Semicolon,
    /// ` :`
    Colon,
}

impl ExceptionKind {
    fn mark(self) -> &'static str {
        match self {
            ExceptionKind::Semicolon => " ;",
            ExceptionKind::Colon => " :",
        }
    }
}

/// Replaces the default punctuation when the preceding subfield has a given code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PunctuationException {
    /// Code of the preceding subfield that triggers the exception
    pub preceded_by: char,
    /// Mark appended to the preceding subfield
    pub insert: ExceptionKind,
}

/// Punctuation behavior of one subfield code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunctuationRule {
    /// Subfield code the rule applies to
    pub code: char,
    /// Portion the subfield belongs to
    pub portion: Portion,
    /// Punctuation added to the preceding subfield within the same portion
    pub preceding: PrecedingPunctuation,
    /// Exceptions checked before `preceding`
    #[serde(default)]
    pub exceptions: Vec<PunctuationException>,
}

/// One rule table entry in the JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Tag selector such as `X00`
    pub selector: String,
    /// The rule for one code under that selector
    #[serde(flatten)]
    pub rule: PunctuationRule,
}

/// A tag pattern such as `X00`, where `X` matches any character.
#[derive(Debug, Clone)]
pub struct TagSelector {
    pattern: String,
}

impl TagSelector {
    /// Compile a selector.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] unless the selector is three characters
    /// of ASCII alphanumerics or `X`.
    pub fn new(pattern: &str) -> Result<Self> {
        let valid = pattern.chars().count() == 3 && pattern.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(SyncError::Config(format!("invalid tag selector {pattern:?}")));
        }
        Ok(TagSelector {
            pattern: pattern.to_string(),
        })
    }

    /// Whether the selector matches a tag.
    #[must_use]
    pub fn matches(&self, tag: &str) -> bool {
        tag.chars().count() == 3 && self.pattern.chars().zip(tag.chars()).all(|(p, t)| p == 'X' || p == t)
    }

    /// The selector as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

#[derive(Debug, Clone)]
struct RuleGroup {
    selector: TagSelector,
    rules: IndexMap<char, PunctuationRule>,
}

/// Immutable lookup from tag and subfield code to punctuation rule.
#[derive(Debug, Clone)]
pub struct RuleTable {
    groups: Vec<RuleGroup>,
}

// ============================================================================
// Built-in rules
// ============================================================================

type RuleSpec = (char, Portion, PrecedingPunctuation, &'static [(char, ExceptionKind)]);

const SPECIFIER_EXCEPTIONS: &[(char, ExceptionKind)] = &[('c', Semicolon), ('d', Colon)];

const PERSONAL_NAME: &[RuleSpec] = &[
    ('a', Name, NoMark, &[]),
    ('b', Name, NoMark, &[]),
    ('c', Name, Comma, &[]),
    ('d', Name, Comma, &[]),
    ('e', Name, CondComma, &[]),
    ('g', NameOrTitle, Comma, &[]),
    ('j', Name, CondComma, &[]),
    ('q', Name, Comma, &[]),
    ('u', Name, NoMark, &[]),
];

const CORPORATE_NAME: &[RuleSpec] = &[
    ('a', Name, NoMark, &[]),
    ('b', Name, Period, &[]),
    ('c', Name, Comma, SPECIFIER_EXCEPTIONS),
    ('d', Name, NoMark, &[]),
    ('e', Name, CondComma, &[]),
    ('g', NameOrTitle, NoMark, &[]),
    ('n', NameOrTitle, NoMark, &[]),
    ('u', Name, NoMark, &[]),
];

const MEETING_NAME: &[RuleSpec] = &[
    ('a', Name, NoMark, &[]),
    ('c', Name, Comma, SPECIFIER_EXCEPTIONS),
    ('d', Name, NoMark, &[]),
    ('e', Name, Period, &[]),
    ('g', NameOrTitle, NoMark, &[]),
    ('j', Name, CondComma, &[]),
    ('n', NameOrTitle, NoMark, &[]),
    ('q', Name, Period, &[]),
    ('u', Name, NoMark, &[]),
];

const TITLE_AND_SUBJECT: &[RuleSpec] = &[
    ('t', Title, Period, &[]),
    ('f', Title, Period, &[]),
    ('h', Title, NoMark, &[]),
    ('k', Title, NoMark, &[]),
    ('l', Title, Period, &[]),
    ('m', Title, Comma, &[]),
    ('n', Title, Period, &[]),
    ('o', Title, NoMark, &[]),
    ('p', Title, NoMark, &[]),
    ('r', Title, Comma, &[]),
    ('s', Title, Period, &[]),
    ('v', Subject, NoMark, &[]),
    ('x', Subject, NoMark, &[]),
    ('y', Subject, NoMark, &[]),
    ('z', Subject, NoMark, &[]),
    ('i', NoPunctuation, NoMark, &[]),
];

const CONTROL_CODES: &str = "0123456789";

fn builtin_group(selector: &'static str, name_rules: &[RuleSpec]) -> RuleGroup {
    let mut rules = IndexMap::new();
    for &(code, portion, preceding, exceptions) in name_rules.iter().chain(TITLE_AND_SUBJECT) {
        // name rules take precedence for codes shared with the title table
        rules.entry(code).or_insert_with(|| PunctuationRule {
            code,
            portion,
            preceding,
            exceptions: exceptions
                .iter()
                .map(|&(preceded_by, insert)| PunctuationException {
                    preceded_by,
                    insert,
                })
                .collect(),
        });
    }
    for code in CONTROL_CODES.chars() {
        rules.insert(
            code,
            PunctuationRule {
                code,
                portion: ControlField,
                preceding: NoMark,
                exceptions: Vec::new(),
            },
        );
    }
    RuleGroup {
        selector: TagSelector {
            pattern: selector.to_string(),
        },
        rules,
    }
}

fn builtin_table() -> RuleTable {
    let groups = [
        ("X00", PERSONAL_NAME),
        ("X10", CORPORATE_NAME),
        ("X11", MEETING_NAME),
    ]
    .iter()
    .map(|&(selector, rules)| builtin_group(selector, rules))
    .collect();
    RuleTable { groups }
}

impl RuleTable {
    /// Built-in rules for bibliographic headings (X00/X10/X11).
    #[must_use]
    pub fn bibliographic() -> Self {
        builtin_table()
    }

    /// Built-in rules for authority headings (X00/X10/X11).
    ///
    /// Authority headings share the bibliographic rule content; they differ
    /// only in the trailing period, which is decided by [`Punctuator`].
    #[must_use]
    pub fn authority() -> Self {
        builtin_table()
    }

    /// Build a table from entries, grouping them by selector in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] for invalid selectors or a code listed
    /// twice under one selector.
    pub fn from_entries(entries: Vec<RuleEntry>) -> Result<Self> {
        let mut groups: Vec<RuleGroup> = Vec::new();
        for RuleEntry { selector, rule } in entries {
            let index = match groups.iter().position(|g| g.selector.as_str() == selector) {
                Some(index) => index,
                None => {
                    groups.push(RuleGroup {
                        selector: TagSelector::new(&selector)?,
                        rules: IndexMap::new(),
                    });
                    groups.len() - 1
                }
            };
            let code = rule.code;
            if groups[index].rules.insert(code, rule).is_some() {
                return Err(SyncError::Config(format!(
                    "duplicate rule for {selector} ${code}"
                )));
            }
        }
        Ok(RuleTable { groups })
    }

    /// Load a table from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] for malformed JSON, unknown portion or
    /// punctuation names, and anything [`RuleTable::from_entries`] rejects.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<RuleEntry> = serde_json::from_str(json)
            .map_err(|e| SyncError::Config(format!("invalid punctuation rules: {e}")))?;
        Self::from_entries(entries)
    }

    /// Flatten the table back into entries.
    #[must_use]
    pub fn entries(&self) -> Vec<RuleEntry> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.rules.values().map(|rule| RuleEntry {
                    selector: g.selector.as_str().to_string(),
                    rule: rule.clone(),
                })
            })
            .collect()
    }

    /// The first rule for `code` among the groups whose selector matches `tag`.
    #[must_use]
    pub fn rule(&self, tag: &str, code: char) -> Option<&PunctuationRule> {
        self.groups
            .iter()
            .filter(|g| g.selector.matches(tag))
            .find_map(|g| g.rules.get(&code))
    }
}

// ============================================================================
// Punctuator
// ============================================================================

/// Applies a [`RuleTable`] to fields of one record kind.
#[derive(Debug, Clone)]
pub struct Punctuator {
    table: RuleTable,
    kind: RecordKind,
}

impl Punctuator {
    /// Create a punctuator; bibliographic punctuators end headings with a period.
    #[must_use]
    pub fn new(table: RuleTable, kind: RecordKind) -> Self {
        Punctuator { table, kind }
    }

    /// Punctuator with the built-in table for a record kind.
    #[must_use]
    pub fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Bibliographic => Self::new(RuleTable::bibliographic(), kind),
            RecordKind::Authority => Self::new(RuleTable::authority(), kind),
        }
    }

    /// Record kind this punctuator was built for.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Repair punctuation of `field` in place.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownSubfieldCode`] when a subfield has no rule
    /// for the field's tag. Subfields before it may already have been changed.
    pub fn punctuate(&self, field: &mut Field) -> Result<()> {
        let mut in_name = true;
        let mut current: Option<Portion> = None;
        let mut preceding: Option<usize> = None;

        for index in 0..field.subfields.len() {
            let code = field.subfields[index].code;
            let rule = self
                .table
                .rule(&field.tag, code)
                .ok_or_else(|| SyncError::UnknownSubfieldCode {
                    tag: field.tag.clone(),
                    code,
                })?;

            let mut portion = rule.portion;
            if matches!(portion, ControlField | NoPunctuation) {
                continue;
            }
            if in_name && matches!(portion, Title | Subject) {
                in_name = false;
            }
            if portion == NameOrTitle {
                portion = if in_name { Name } else { Title };
            }

            if let (Some(current), Some(prev)) = (current, preceding) {
                let (head, tail) = field.subfields.split_at_mut(index);
                if current != portion {
                    if portion != Subject {
                        add_portion_punctuation(&mut head[prev]);
                    }
                } else {
                    add_subfield_punctuation(&mut head[prev], &tail[0], rule);
                }
            }

            current = Some(portion);
            preceding = Some(index);
        }

        if self.kind == RecordKind::Bibliographic {
            if let Some(prev) = preceding {
                add_portion_punctuation(&mut field.subfields[prev]);
            }
        }

        Ok(())
    }
}

fn append(subfield: &mut Subfield, mark: &str) {
    trace!(code = %subfield.code, from = %subfield.value, mark, "adding punctuation");
    subfield.value.push_str(mark);
}

fn add_portion_punctuation(preceding: &mut Subfield) {
    if !preceding.value.ends_with(['?', '"', ')', ']', '.', '-', '!', ',']) {
        append(preceding, ".");
    }
}

fn add_subfield_punctuation(preceding: &mut Subfield, current: &Subfield, rule: &PunctuationRule) {
    if let Some(exception) = rule
        .exceptions
        .iter()
        .find(|e| e.preceded_by == preceding.code)
    {
        let mark = exception.insert.mark();
        if !preceding.value.ends_with(mark.trim_start()) {
            append(preceding, mark);
        }
        return;
    }

    match rule.preceding {
        PrecedingPunctuation::None => {}
        PrecedingPunctuation::Period => {
            if !preceding.value.ends_with(['?', '"', ')', ']', '-', '!', ',', '.']) {
                append(preceding, ".");
            }
        }
        PrecedingPunctuation::Comma => {
            if !preceding.value.ends_with(',') && !current.value.starts_with(['[', '(']) {
                append(preceding, ",");
            }
        }
        PrecedingPunctuation::CondComma => {
            if !preceding.value.ends_with(['-', ',']) {
                append(preceding, ",");
            }
        }
    }
}

impl fmt::Display for Portion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Name => "N",
            Title => "T",
            Subject => "S",
            NameOrTitle => "NT",
            ControlField => "CF",
            NoPunctuation => "NC",
        };
        f.write_str(name)
    }
}
