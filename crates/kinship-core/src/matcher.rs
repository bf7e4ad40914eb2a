//! Shared-ancestor detection between two trees.

use crate::types::Member;

/// Return every `(source, target)` pair considered the same person.
///
/// A pair matches iff the full names are byte-for-byte equal and both birth
/// years are present and equal. A missing birth year never matches, not even
/// another missing one. No case, whitespace or diacritic normalisation.
///
/// Full cross product, O(n * m). Pairs come out in source order, then target
/// order. An empty result is a normal answer meaning "nothing shared".
pub fn find_shared_ancestors<'a>(
    source: &'a [Member],
    target: &'a [Member],
) -> Vec<(&'a Member, &'a Member)> {
    let mut pairs = Vec::new();
    for s in source {
        let Some(s_year) = s.birth_year else {
            continue;
        };
        for t in target {
            if t.birth_year == Some(s_year) && t.full_name == s.full_name {
                pairs.push((s, t));
            }
        }
    }
    pairs
}
