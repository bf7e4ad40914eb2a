//! Relation validation.
//!
//! Decides whether a new member may be attached to an existing one, detects
//! duplicate attachments, and validates member fields. Everything here is a
//! pure decision; the caller performs the mutation.

use crate::error::{KinshipError, Result};
use crate::types::{Member, NewMember, RelationType};

/// Whether a member with role `new_type` may be attached to an existing
/// member whose stored label is `existing_type`.
///
/// Compatibility table:
/// - Father  -> Child, Mother, Spouse
/// - Mother  -> Child, Father, Spouse
/// - Child   -> Father, Mother
/// - Sibling -> Sibling
/// - Spouse  -> Father, Mother
pub fn is_compatible(new_type: RelationType, existing_type: RelationType) -> bool {
    use RelationType::*;
    matches!(
        (new_type, existing_type),
        (Father, Child | Mother | Spouse)
            | (Mother, Child | Father | Spouse)
            | (Child, Father | Mother)
            | (Sibling, Sibling)
            | (Spouse, Father | Mother)
    )
}

/// Check that `candidate` may be attached to `anchor` with `role`.
///
/// `anchor_neighbors` are the members already linked to the anchor. A
/// neighbor with the same `(relation_type, full_name, birth_year)` triple
/// as the candidate is a duplicate. Missing birth years compare equal here:
/// two undated "Child Aziz" entries under one parent are the same entry.
pub fn check_attachment(
    role: RelationType,
    anchor: &Member,
    anchor_neighbors: &[Member],
    candidate: &NewMember,
) -> Result<()> {
    if !is_compatible(role, anchor.relation_type) {
        return Err(KinshipError::InvalidRelation {
            new: role,
            existing: anchor.relation_type,
        });
    }

    let duplicate = anchor_neighbors.iter().any(|m| {
        m.relation_type == role
            && m.full_name == candidate.full_name
            && m.birth_year == candidate.birth_year
    });
    if duplicate {
        return Err(KinshipError::DuplicateRelation {
            relation_type: role,
            full_name: candidate.full_name.clone(),
        });
    }

    Ok(())
}

/// Validate and normalise a new member's fields.
///
/// Trims the name. Birth year must lie in `[min_birth_year, current_year]`;
/// death year must not precede the birth year nor lie in the future.
pub fn validate_new_member(
    input: &NewMember,
    min_birth_year: i32,
    current_year: i32,
) -> Result<NewMember> {
    let full_name = validate_fields(
        &input.full_name,
        input.birth_year,
        input.death_year,
        min_birth_year,
        current_year,
    )?;
    Ok(NewMember {
        full_name,
        ..input.clone()
    })
}

/// Field-level checks shared by insert and update. Returns the trimmed name.
pub fn validate_fields(
    full_name: &str,
    birth_year: Option<i32>,
    death_year: Option<i32>,
    min_birth_year: i32,
    current_year: i32,
) -> Result<String> {
    let name = full_name.trim();
    if name.is_empty() {
        return Err(KinshipError::Validation("full name must not be empty".into()));
    }

    if let Some(year) = birth_year {
        if year < min_birth_year || year > current_year {
            return Err(KinshipError::Validation(format!(
                "birth year {} outside [{}, {}]",
                year, min_birth_year, current_year
            )));
        }
    }

    if let Some(year) = death_year {
        if year > current_year {
            return Err(KinshipError::Validation(format!(
                "death year {} is in the future",
                year
            )));
        }
        if let Some(birth) = birth_year {
            if year < birth {
                return Err(KinshipError::Validation(format!(
                    "death year {} precedes birth year {}",
                    year, birth
                )));
            }
        }
    }

    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Timestamp, UserId};
    use uuid::Uuid;
    use RelationType::*;

    fn member(name: &str, birth: Option<i32>, rt: RelationType) -> Member {
        Member {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            birth_year: birth,
            death_year: None,
            relation_type: rt,
            is_private: false,
            owner_id: UserId(1),
            tree_id: None,
            notes: String::new(),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    // =====================================================================
    // Compatibility table: all 25 pairs
    // =====================================================================

    #[test]
    fn test_compatibility_table_all_pairs() {
        let cases: [(RelationType, RelationType, bool); 25] = [
            (Father, Father, false),
            (Father, Mother, true),
            (Father, Sibling, false),
            (Father, Child, true),
            (Father, Spouse, true),
            (Mother, Father, true),
            (Mother, Mother, false),
            (Mother, Sibling, false),
            (Mother, Child, true),
            (Mother, Spouse, true),
            (Sibling, Father, false),
            (Sibling, Mother, false),
            (Sibling, Sibling, true),
            (Sibling, Child, false),
            (Sibling, Spouse, false),
            (Child, Father, true),
            (Child, Mother, true),
            (Child, Sibling, false),
            (Child, Child, false),
            (Child, Spouse, false),
            (Spouse, Father, true),
            (Spouse, Mother, true),
            (Spouse, Sibling, false),
            (Spouse, Child, false),
            (Spouse, Spouse, false),
        ];

        for (new, existing, expected) in cases {
            assert_eq!(
                is_compatible(new, existing),
                expected,
                "is_compatible({new}, {existing})"
            );
        }
    }

    #[test]
    fn test_compatible_pair_count() {
        let count = RelationType::ALL
            .iter()
            .flat_map(|a| RelationType::ALL.iter().map(move |b| (*a, *b)))
            .filter(|(a, b)| is_compatible(*a, *b))
            .count();
        assert_eq!(count, 11);
    }

    #[test]
    fn test_label_is_relative_to_anchor_not_absolute() {
        // The anchor was stored as "father" (father of whoever it was attached
        // to). Attaching a child to it is fine, but attaching another father is
        // rejected even though a grandfather is a perfectly real relative: the
        // stored label is compared, not the anchor's generation.
        let anchor = member("Vali", Some(1960), Father);
        assert!(check_attachment(Child, &anchor, &[], &NewMember::new("Aziz", Some(1990), Child)).is_ok());
        let err =
            check_attachment(Father, &anchor, &[], &NewMember::new("Karim", Some(1930), Father))
                .unwrap_err();
        assert!(matches!(err, KinshipError::InvalidRelation { new: Father, existing: Father }));
    }

    // =====================================================================
    // Duplicate detection
    // =====================================================================

    #[test]
    fn test_duplicate_same_triple_rejected() {
        let anchor = member("Vali", Some(1960), Father);
        let existing = member("Aziz", Some(1990), Child);
        let candidate = NewMember::new("Aziz", Some(1990), Child);

        let err = check_attachment(Child, &anchor, &[existing], &candidate).unwrap_err();
        assert!(matches!(err, KinshipError::DuplicateRelation { .. }));
    }

    #[test]
    fn test_duplicate_requires_all_three_fields() {
        let anchor = member("Vali", Some(1960), Father);
        let existing = vec![
            member("Aziz", Some(1991), Child),
            member("Aziz", Some(1990), Spouse),
            member("Aziza", Some(1990), Child),
        ];
        let candidate = NewMember::new("Aziz", Some(1990), Child);
        assert!(check_attachment(Child, &anchor, &existing, &candidate).is_ok());
    }

    #[test]
    fn test_duplicate_with_missing_birth_years() {
        let anchor = member("Vali", Some(1960), Father);
        let existing = member("Aziz", None, Child);
        let candidate = NewMember::new("Aziz", None, Child);
        assert!(check_attachment(Child, &anchor, &[existing], &candidate).is_err());
    }

    #[test]
    fn test_incompatibility_reported_before_duplicate() {
        let anchor = member("Olim", Some(1990), Child);
        let existing = member("Aziz", Some(1990), Sibling);
        let candidate = NewMember::new("Aziz", Some(1990), Sibling);
        let err = check_attachment(Sibling, &anchor, &[existing], &candidate).unwrap_err();
        assert!(matches!(err, KinshipError::InvalidRelation { .. }));
    }

    // =====================================================================
    // Field validation
    // =====================================================================

    #[test]
    fn test_validate_trims_name() {
        let input = NewMember::new("  Vali  ", Some(1960), Father);
        let out = validate_new_member(&input, 1900, 2026).unwrap();
        assert_eq!(out.full_name, "Vali");
    }

    #[test]
    fn test_validate_empty_name() {
        let input = NewMember::new("   ", None, Father);
        assert!(matches!(
            validate_new_member(&input, 1900, 2026),
            Err(KinshipError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_birth_year_bounds() {
        assert!(validate_fields("A", Some(1900), None, 1900, 2026).is_ok());
        assert!(validate_fields("A", Some(2026), None, 1900, 2026).is_ok());
        assert!(validate_fields("A", Some(1899), None, 1900, 2026).is_err());
        assert!(validate_fields("A", Some(2027), None, 1900, 2026).is_err());
        assert!(validate_fields("A", None, None, 1900, 2026).is_ok());
    }

    #[test]
    fn test_validate_death_year() {
        assert!(validate_fields("A", Some(1950), Some(1950), 1900, 2026).is_ok());
        assert!(validate_fields("A", Some(1950), Some(1949), 1900, 2026).is_err());
        assert!(validate_fields("A", None, Some(2030), 1900, 2026).is_err());
        assert!(validate_fields("A", None, Some(1980), 1900, 2026).is_ok());
    }
}
