//! Splicing an authorized portion into a linked heading field.
//!
//! [`merge_authorized_portion`] replaces the authorized run of a target field
//! with the authorized subfields of a source heading, takes over the source's
//! first indicator and tag series, and then brings the specifier run in line.
//! Subfields outside the spliced runs keep their values and relative order.

use crate::authorized_portion::{resolve_authorized_portion, AuthorizedPortion, RecordKind};
use crate::error::Result;
use crate::record::Field;
use tracing::debug;

/// Merge a source authorized portion into a copy of `target`.
///
/// Steps, each on the result of the previous one:
///
/// 1. Replace the target's authorized run with `source.subfields`.
/// 2. Set the first indicator to the source's.
/// 3. If the source tag's last two characters differ from the target's,
///    rewrite them (a 500 linked to a 110 heading becomes 510); the first
///    character is never changed.
/// 4. Re-resolve the updated field. If the new tag classifies neighbouring
///    target subfields as authorized too, splice again until the authorized
///    run is exactly the source subfields.
/// 5. If the source carries a specifier, replace the target's specifier run
///    with it, or insert it after the authorized run when the target has none.
///    A target specifier with codes the source specifier lacks is kept as is.
///
/// Merging the same source into the result again yields the result.
///
/// # Errors
///
/// Propagates [`crate::SyncError::UnsupportedTag`] and
/// [`crate::SyncError::StructuralAmbiguity`] from resolving the target.
pub fn merge_authorized_portion(
    target: &Field,
    kind: RecordKind,
    source: &AuthorizedPortion,
) -> Result<Field> {
    let current = resolve_authorized_portion(target, kind)?;

    let mut updated = target.clone();
    updated.splice_subfields(
        current.range.start,
        current.range.length,
        source.subfields.iter().cloned(),
    );
    updated.indicator1 = source.indicator1;

    if source.tag.get(1..) != updated.tag.get(1..) {
        let category: String = updated.tag.chars().take(1).collect();
        let series = source.tag.get(1..).unwrap_or_default();
        debug!(from = %updated.tag, to = %format!("{category}{series}"), "rewriting tag series");
        updated.tag = format!("{category}{series}");
    }

    let mut inserted_at = current.range.start;
    let mut resolved = resolve_authorized_portion(&updated, kind)?;
    // Each pass shrinks the field, so this terminates.
    while absorbs_neighbours(&resolved, inserted_at, source.subfields.len()) {
        updated.splice_subfields(
            resolved.range.start,
            resolved.range.length,
            source.subfields.iter().cloned(),
        );
        inserted_at = resolved.range.start;
        resolved = resolve_authorized_portion(&updated, kind)?;
    }

    let Some(source_specifier) = source.specifier.as_ref().filter(|s| !s.subfields.is_empty())
    else {
        return Ok(updated);
    };

    match &resolved.specifier {
        Some(existing) => {
            let richer = existing
                .subfields
                .iter()
                .any(|sf| !source_specifier.has_code(sf.code));
            if richer {
                debug!(tag = %updated.tag, "keeping target specifier with codes the source lacks");
            } else {
                updated.splice_subfields(
                    existing.range.start,
                    existing.range.length,
                    source_specifier.subfields.iter().cloned(),
                );
            }
        }
        None => {
            updated.splice_subfields(
                resolved.range.end(),
                0,
                source_specifier.subfields.iter().cloned(),
            );
        }
    }

    Ok(updated)
}

// The re-resolved authorized run strictly contains the spliced subfields.
fn absorbs_neighbours(resolved: &AuthorizedPortion, inserted_at: usize, inserted_len: usize) -> bool {
    let range = resolved.range;
    range.start <= inserted_at
        && range.end() >= inserted_at + inserted_len
        && range.length > inserted_len
}
