//! Family graph views.
//!
//! Builds two read-only views over a flat member list with undirected
//! edges: the bucketed flat view used for text output, and the
//! generation-banded layout used for PDF export. Edges are resolved through
//! an id -> index lookup; nodes never own each other.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::types::{Member, MemberWithEdges, RelationType};

// =============================================================================
// Flat view
// =============================================================================

/// A member plus the display names of its direct neighbors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyEntry {
    pub member: Member,
    pub related_to: Vec<String>,
}

/// Members grouped by their relation label, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FamilyBuckets {
    pub parents: Vec<FamilyEntry>,
    pub siblings: Vec<FamilyEntry>,
    pub spouse: Option<FamilyEntry>,
    /// Spouses beyond the first; they are not displayed.
    pub extra_spouses: usize,
    pub children: Vec<FamilyEntry>,
}

impl FamilyBuckets {
    pub fn len(&self) -> usize {
        self.parents.len()
            + self.siblings.len()
            + usize::from(self.spouse.is_some())
            + self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TreeView {
    Empty,
    Family(FamilyBuckets),
}

/// Partition members into parents, siblings, spouse and children.
///
/// The first spouse wins; the rest are only counted. Neighbor ids that are
/// not part of `members` are ignored.
pub fn build_tree(members: &[MemberWithEdges]) -> TreeView {
    if members.is_empty() {
        return TreeView::Empty;
    }

    let names: HashMap<Uuid, &str> = members
        .iter()
        .map(|m| (m.member.id, m.member.full_name.as_str()))
        .collect();

    let mut buckets = FamilyBuckets::default();
    for item in members {
        let mut seen = HashSet::new();
        let related_to = item
            .neighbors
            .iter()
            .filter(|id| **id != item.member.id && seen.insert(**id))
            .filter_map(|id| names.get(id).map(|n| n.to_string()))
            .collect();
        let entry = FamilyEntry {
            member: item.member.clone(),
            related_to,
        };

        match item.member.relation_type {
            RelationType::Father | RelationType::Mother => buckets.parents.push(entry),
            RelationType::Sibling => buckets.siblings.push(entry),
            RelationType::Child => buckets.children.push(entry),
            RelationType::Spouse => {
                if buckets.spouse.is_none() {
                    buckets.spouse = Some(entry);
                } else {
                    debug!(member_id = %item.member.id, "Additional spouse not displayed");
                    buckets.extra_spouses += 1;
                }
            }
        }
    }

    TreeView::Family(buckets)
}

// =============================================================================
// Hierarchical layout
// =============================================================================

/// Distances used to position nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSpacing {
    pub generation: f64,
    pub sibling: f64,
}

impl Default for LayoutSpacing {
    fn default() -> Self {
        Self {
            generation: 110.0,
            sibling: 130.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNode {
    pub member_id: Uuid,
    pub full_name: String,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub generation: usize,
    pub slot: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LinkKind {
    /// `from` is the parent, `to` the child.
    ParentChild,
    /// Same-generation relation: partners, co-parents, siblings.
    Peer,
}

/// A link between two placed nodes, by index into [`TreeLayout::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LayoutLink {
    pub from: usize,
    pub to: usize,
    pub kind: LinkKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeLayout {
    pub nodes: Vec<PlacedNode>,
    pub links: Vec<LayoutLink>,
}

impl TreeLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of generation bands.
    pub fn generations(&self) -> usize {
        self.nodes.iter().map(|n| n.generation + 1).max().unwrap_or(0)
    }

    /// Widest band, in nodes.
    pub fn max_band_width(&self) -> usize {
        self.nodes.iter().map(|n| n.slot + 1).max().unwrap_or(0)
    }

    pub fn nodes_in_generation(&self, generation: usize) -> impl Iterator<Item = &PlacedNode> {
        self.nodes.iter().filter(move |n| n.generation == generation)
    }
}

/// `a` is the parent of `b` on the edge between them.
fn is_parent_of(a: &Member, b: &Member) -> bool {
    a.relation_type.is_parent()
        && matches!(b.relation_type, RelationType::Child | RelationType::Sibling)
}

/// Lay the graph out in generation bands.
///
/// Roots are members without an incoming parent edge. From each root the
/// descent places non-parent neighbors (partners, siblings) in the same band
/// and children one band below. A visited set makes cycles and multi-parent
/// children terminate; each member is placed exactly once. Members that no
/// root reaches are laid out as extra roots afterwards.
pub fn build_layout(members: &[MemberWithEdges], spacing: LayoutSpacing) -> TreeLayout {
    if members.is_empty() {
        return TreeLayout::default();
    }

    let index: HashMap<Uuid, usize> = members
        .iter()
        .enumerate()
        .map(|(i, m)| (m.member.id, i))
        .collect();

    let adjacency: Vec<Vec<usize>> = members
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let mut seen = HashSet::new();
            m.neighbors
                .iter()
                .filter_map(|id| index.get(id).copied())
                .filter(|j| *j != i && seen.insert(*j))
                .collect()
        })
        .collect();

    let member = |i: usize| &members[i].member;

    let has_parent: Vec<bool> = (0..members.len())
        .map(|i| adjacency[i].iter().any(|&j| is_parent_of(member(j), member(i))))
        .collect();

    let mut placed: Vec<Option<usize>> = vec![None; members.len()];
    let mut band_fill: Vec<usize> = Vec::new();
    let mut nodes: Vec<PlacedNode> = Vec::with_capacity(members.len());

    let roots = (0..members.len())
        .filter(|&i| !has_parent[i])
        .chain(0..members.len());

    for root in roots {
        if placed[root].is_some() {
            continue;
        }

        // Explicit stack instead of call recursion; pushing in reverse keeps
        // neighbour order stable.
        let mut stack = vec![(root, 0usize)];
        while let Some((i, generation)) = stack.pop() {
            if placed[i].is_some() {
                continue;
            }

            if band_fill.len() <= generation {
                band_fill.resize(generation + 1, 0);
            }
            let slot = band_fill[generation];
            band_fill[generation] += 1;

            let m = member(i);
            placed[i] = Some(nodes.len());
            nodes.push(PlacedNode {
                member_id: m.id,
                full_name: m.full_name.clone(),
                birth_year: m.birth_year,
                death_year: m.death_year,
                generation,
                slot,
                x: slot as f64 * spacing.sibling,
                y: generation as f64 * spacing.generation,
            });

            let mut peers = Vec::new();
            let mut children = Vec::new();
            for &j in &adjacency[i] {
                if placed[j].is_some() {
                    continue;
                }
                if is_parent_of(m, member(j)) {
                    children.push(j);
                } else if !is_parent_of(member(j), m) {
                    peers.push(j);
                }
                // Unplaced parents are reached later as roots.
            }

            for &c in children.iter().rev() {
                stack.push((c, generation + 1));
            }
            for &p in peers.iter().rev() {
                stack.push((p, generation));
            }
        }
    }

    let mut links = Vec::new();
    let mut seen = HashSet::new();
    for (i, neighbors) in adjacency.iter().enumerate() {
        for &j in neighbors {
            let (a, b) = if i < j { (i, j) } else { (j, i) };
            if !seen.insert((a, b)) {
                continue;
            }
            let (Some(na), Some(nb)) = (placed[a], placed[b]) else {
                continue;
            };
            let link = if is_parent_of(member(a), member(b)) {
                LayoutLink { from: na, to: nb, kind: LinkKind::ParentChild }
            } else if is_parent_of(member(b), member(a)) {
                LayoutLink { from: nb, to: na, kind: LinkKind::ParentChild }
            } else {
                LayoutLink { from: na, to: nb, kind: LinkKind::Peer }
            };
            links.push(link);
        }
    }

    debug!(
        nodes = nodes.len(),
        links = links.len(),
        generations = band_fill.len(),
        "Tree layout built"
    );

    TreeLayout { nodes, links }
}
