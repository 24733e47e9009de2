//! Heading normalization and link-target selection for bulk linking.
//!
//! Bulk tooling that adds `$0` links to existing records needs to find the
//! field carrying a given heading. Headings are compared in a normalized form
//! that ignores case, most diacritics and punctuation, sub-element by
//! sub-element. The Nordic vowels `ä`, `å`, `ö` and `ø` stay distinct from
//! their base letters.
//!
//! # Examples
//!
//! ```
//! use heading_sync::heading_query::normalize_for_heading_query;
//!
//! assert_eq!(normalize_for_heading_query("Ærø, Jørgen (1901-1990)"), "AERÂ JÂRGEN 1901 1990");
//! assert_ne!(normalize_for_heading_query("Mäkinen"), normalize_for_heading_query("Makinen"));
//! ```

use crate::authorized_portion::{resolve_authorized_portion, RecordKind};
use crate::error::{Result, SyncError};
use crate::record::{Field, Record, Subfield};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Name heading tags searched for a link target.
pub const LINKING_TAGS: [&str; 9] = ["100", "600", "700", "110", "610", "710", "111", "611", "711"];

/// Series heading tags; a match only here is reported separately.
pub const SERIES_TAGS: [&str; 3] = ["800", "810", "811"];

/// Authority see-also tags searched for a link target.
pub const AUTHORITY_LINKING_TAGS: [&str; 3] = ["500", "510", "511"];

/// Subfields of an authority see-also field compared against query terms.
const AUTHORITY_NAME_CODES: [char; 8] = ['a', 'b', 'c', 'd', 'e', 'g', 'n', 'q'];

/// Qualifiers of fictional characters that headings are compared without.
const FICTION_QUALIFIERS: [&str; 2] = ["(fiktiivinen hahmo)", "(fiktiv gestalt)"];

// ä, å and ö/ø each fold to their own marker instead of a bare vowel.
fn fold_nordic_vowel(c: char) -> Option<char> {
    match c {
        'ä' | 'Ä' => Some('Á'),
        'å' | 'Å' => Some('À'),
        'ö' | 'Ö' | 'ø' | 'Ø' => Some('Â'),
        _ => None,
    }
}

fn fold_ligature(c: char) -> Option<&'static str> {
    match c {
        'æ' | 'Æ' => Some("AE"),
        'þ' | 'Þ' => Some("TH"),
        'ð' | 'Ð' | 'đ' | 'Đ' => Some("D"),
        'ł' | 'Ł' => Some("L"),
        _ => None,
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ':' | '–' | ',' | '.' | '-' | '_' | '/' | '*' | '[' | ']' | '=' | '$')
}

fn is_dropped(c: char) -> bool {
    matches!(c, '‡' | '\'' | '?' | 'ʼ' | 'ʻ' | '"' | 'ʹ' | '\u{200F}')
}

/// Normalize a heading value for comparison.
///
/// The value is uppercased and stripped of quote marks and diacritics.
/// Common ligatures are spelled out and every run of punctuation and
/// whitespace becomes a single space. `Ä`, `Å` and `Ö`/`Ø` become `Á`, `À`
/// and `Â`, so they never compare equal to `A` or `O`.
#[must_use]
pub fn normalize_for_heading_query(value: &str) -> String {
    let mut spaced = String::with_capacity(value.len());
    for c in value.nfc() {
        if let Some(marker) = fold_nordic_vowel(c) {
            spaced.push(marker);
            continue;
        }
        if let Some(s) = fold_ligature(c) {
            spaced.push_str(s);
            continue;
        }
        for c in std::iter::once(c).nfd().filter(|c| !is_combining_mark(*c)) {
            if is_dropped(c) {
                continue;
            }
            if is_separator(c) {
                spaced.push(' ');
            } else {
                spaced.extend(c.to_uppercase());
            }
        }
    }

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalized(subfields: impl IntoIterator<Item = Subfield>) -> Vec<Subfield> {
    subfields
        .into_iter()
        .map(|s| Subfield::new(s.code, normalize_for_heading_query(&s.value)))
        .collect()
}

fn name_subfields(field: &Field, kind: RecordKind) -> Result<Vec<Subfield>> {
    let portion = resolve_authorized_portion(field, kind)?;
    let mut subfields = portion.subfields;
    if let Some(specifier) = portion.specifier {
        subfields.extend(specifier.subfields);
    }
    Ok(subfields)
}

/// The normalized authorized and specifier sub-elements of a name field.
///
/// # Errors
///
/// Propagates errors from resolving the field's authorized portion.
pub fn heading_terms(field: &Field, kind: RecordKind) -> Result<Vec<Subfield>> {
    Ok(normalized(name_subfields(field, kind)?))
}

/// Heading sub-elements of a bibliographic field as compared for linking.
///
/// Numbering in parentheses in `$d` of personal names and fictional
/// character qualifiers in `$c` of 600 are left out.
fn linking_terms(field: &Field) -> Result<Vec<Subfield>> {
    let personal = field.tag.ends_with("00");
    let subfields = name_subfields(field, RecordKind::Bibliographic)?
        .into_iter()
        .filter(|s| !(personal && s.code == 'd' && is_parenthesized_number(&s.value)))
        .filter(|s| !(field.tag == "600" && s.code == 'c' && FICTION_QUALIFIERS.contains(&s.value.as_str())));
    Ok(normalized(subfields))
}

// Subject headings are only linked when they come from the Finnish
// thesauri: second indicator 4 or `$2 ysa`.
fn is_linkable_subject(field: &Field) -> bool {
    field.indicator2 == '4' || field.subfields_by_code('2').any(|v| v.eq_ignore_ascii_case("ysa"))
}

fn is_parenthesized_number(value: &str) -> bool {
    value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

/// Fields of a bibliographic record whose heading equals one of `terms`.
///
/// Each entry of `terms` is one acceptable heading as produced by
/// [`heading_terms`]. Name fields in the 1XX/6XX/7XX series are searched and
/// returned in record order. 6XX fields take part only with second indicator
/// `4` or a `$2 ysa` source.
///
/// # Errors
///
/// - [`SyncError::LinkingQuery`] with `Found only 8XX field for linking.` when
///   only a series heading matches
/// - [`SyncError::LinkingQuery`] with `Could not find field` when nothing matches
/// - errors from resolving a candidate field's authorized portion
pub fn select_fields_for_linking<'a>(record: &'a Record, terms: &[Vec<Subfield>]) -> Result<Vec<&'a Field>> {
    let mut matches = Vec::new();
    let mut series_match = false;

    for field in &record.fields {
        let tag = field.tag.as_str();
        let is_series = SERIES_TAGS.contains(&tag);
        if !is_series && !LINKING_TAGS.contains(&tag) {
            continue;
        }
        if tag.starts_with('6') && !is_linkable_subject(field) {
            continue;
        }
        let field_terms = linking_terms(field)?;
        if !terms.contains(&field_terms) {
            continue;
        }
        if is_series {
            series_match = true;
        } else {
            matches.push(field);
        }
    }

    if matches.is_empty() {
        let message = if series_match {
            "Found only 8XX field for linking."
        } else {
            "Could not find field"
        };
        return Err(SyncError::LinkingQuery(message.to_string()));
    }
    Ok(matches)
}

/// See-also fields (500/510/511) of an authority record matching `terms`.
///
/// A field matches when one entry of `terms` is contained in the field's
/// normalized `$a $b $c $d $e $g $n $q` subfields. Matches are returned in
/// record order.
///
/// # Errors
///
/// Returns [`SyncError::LinkingQuery`] with `Could not find field` when no
/// field matches.
pub fn select_authority_fields_for_linking<'a>(
    record: &'a Record,
    terms: &[Vec<Subfield>],
) -> Result<Vec<&'a Field>> {
    let matches: Vec<&Field> = record
        .fields
        .iter()
        .filter(|field| AUTHORITY_LINKING_TAGS.contains(&field.tag.as_str()))
        .filter(|field| {
            let name = normalized(
                field
                    .subfields
                    .iter()
                    .filter(|s| AUTHORITY_NAME_CODES.contains(&s.code))
                    .cloned(),
            );
            terms.iter().any(|term| term.iter().all(|s| name.contains(s)))
        })
        .collect();

    if matches.is_empty() {
        return Err(SyncError::LinkingQuery("Could not find field".to_string()));
    }
    Ok(matches)
}
