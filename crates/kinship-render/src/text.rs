//! Plain-text rendering of the flat family view.

use std::fmt::Write as _;

use kinship_core::graph::{build_tree, FamilyEntry, TreeView};
use kinship_core::types::MemberWithEdges;

pub const EMPTY_TREE_MESSAGE: &str = "The family tree is empty. Add a member to get started.";

/// Lifespan label: "1960-2020", "b. 1960", "d. 2020" or "".
pub fn format_years(birth_year: Option<i32>, death_year: Option<i32>) -> String {
    match (birth_year, death_year) {
        (Some(b), Some(d)) => format!("{}-{}", b, d),
        (Some(b), None) => format!("b. {}", b),
        (None, Some(d)) => format!("d. {}", d),
        (None, None) => String::new(),
    }
}

/// Render members as sectioned text: parents, siblings, spouse, children.
pub fn generate_text_tree(members: &[MemberWithEdges]) -> String {
    render_view(&build_tree(members))
}

pub fn render_view(view: &TreeView) -> String {
    let buckets = match view {
        TreeView::Empty => return format!("{}\n", EMPTY_TREE_MESSAGE),
        TreeView::Family(buckets) => buckets,
    };

    let mut out = String::new();
    let total = buckets.len() + buckets.extra_spouses;
    let _ = writeln!(out, "Family tree ({} members)", total);

    section(&mut out, "Parents", &buckets.parents);
    section(&mut out, "Siblings", &buckets.siblings);
    if let Some(spouse) = &buckets.spouse {
        section(&mut out, "Spouse", std::slice::from_ref(spouse));
        if buckets.extra_spouses > 0 {
            let _ = writeln!(out, "  (+{} more not shown)", buckets.extra_spouses);
        }
    }
    section(&mut out, "Children", &buckets.children);
    out
}

fn section(out: &mut String, title: &str, entries: &[FamilyEntry]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}:", title);
    for entry in entries {
        let _ = writeln!(out, "  - {}", entry_line(entry));
    }
}

fn entry_line(entry: &FamilyEntry) -> String {
    let member = &entry.member;
    let mut line = member.full_name.clone();
    let years = format_years(member.birth_year, member.death_year);
    if !years.is_empty() {
        let _ = write!(line, " ({})", years);
    }
    if !entry.related_to.is_empty() {
        let _ = write!(line, ", related to: {}", entry.related_to.join(", "));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::types::{Member, RelationType, Timestamp, UserId};
    use uuid::Uuid;

    fn member(name: &str, birth: Option<i32>, death: Option<i32>, rt: RelationType) -> Member {
        Member {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            birth_year: birth,
            death_year: death,
            relation_type: rt,
            is_private: false,
            owner_id: UserId(1),
            tree_id: None,
            notes: String::new(),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    fn with_edges(member: Member, neighbors: &[&Member]) -> MemberWithEdges {
        MemberWithEdges {
            member,
            neighbors: neighbors.iter().map(|m| m.id).collect(),
        }
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(generate_text_tree(&[]), format!("{}\n", EMPTY_TREE_MESSAGE));
    }

    #[test]
    fn test_format_years() {
        assert_eq!(format_years(Some(1960), Some(2020)), "1960-2020");
        assert_eq!(format_years(Some(1960), None), "b. 1960");
        assert_eq!(format_years(None, Some(2020)), "d. 2020");
        assert_eq!(format_years(None, None), "");
    }

    #[test]
    fn test_sections_in_order() {
        let father = member("Vali", Some(1960), Some(2020), RelationType::Father);
        let mother = member("Zuhra", Some(1962), None, RelationType::Mother);
        let child = member("Aziz", None, None, RelationType::Child);
        let spouse = member("Malika", Some(1991), None, RelationType::Spouse);
        let second = member("Nodira", None, None, RelationType::Spouse);

        let members = vec![
            with_edges(child.clone(), &[&father, &mother]),
            with_edges(father.clone(), &[&child]),
            with_edges(mother.clone(), &[&child]),
            with_edges(spouse.clone(), &[]),
            with_edges(second, &[]),
        ];

        let text = generate_text_tree(&members);
        let expected = "Family tree (5 members)\n\
            \n\
            Parents:\n\
            \x20 - Vali (1960-2020), related to: Aziz\n\
            \x20 - Zuhra (b. 1962), related to: Aziz\n\
            \n\
            Spouse:\n\
            \x20 - Malika (b. 1991)\n\
            \x20 (+1 more not shown)\n\
            \n\
            Children:\n\
            \x20 - Aziz, related to: Vali, Zuhra\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_empty_sections_omitted() {
        let sibling = member("Olim", Some(1988), None, RelationType::Sibling);
        let text = generate_text_tree(&[with_edges(sibling, &[])]);
        assert!(text.contains("Siblings:"));
        assert!(!text.contains("Parents:"));
        assert!(!text.contains("Children:"));
    }
}
