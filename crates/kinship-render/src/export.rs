//! Hierarchical PDF export.
//!
//! Lays a tree out in generation bands, splits the bands across pages, and
//! draws one box per member with its name and lifespan. Parent links run
//! from the bottom of the parent's box to the top of the child's; peer links
//! join box sides. Links between bands on different pages are not drawn.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use kinship_action::FamilyService;
use kinship_core::config::RenderConfig;
use kinship_core::error::KinshipError;
use kinship_core::graph::{build_layout, LayoutSpacing, LinkKind, PlacedNode, TreeLayout};
use kinship_core::types::{MemberWithEdges, UserId};

use crate::pdf::{fit_text, Page, PdfWriter};
use crate::text::{format_years, EMPTY_TREE_MESSAGE};

const BOX_WIDTH: f64 = 110.0;
const BOX_HEIGHT: f64 = 34.0;
const HEADER_HEIGHT: f64 = 30.0;
const FOOTER_HEIGHT: f64 = 16.0;

/// Where a node ended up on the page.
#[derive(Debug, Clone, Copy)]
struct NodeBox {
    page: usize,
    cx: f64,
    top: f64,
    width: f64,
}

impl NodeBox {
    fn bottom(&self) -> f64 {
        self.top - BOX_HEIGHT
    }

    fn mid_y(&self) -> f64 {
        self.top - BOX_HEIGHT / 2.0
    }
}

/// Renders stored trees to PDF files.
pub struct TreeExporter {
    family: Arc<FamilyService>,
    config: RenderConfig,
}

impl TreeExporter {
    pub fn new(family: Arc<FamilyService>, config: RenderConfig) -> Self {
        Self { family, config }
    }

    /// Load the tree as `user` sees it and write it to `output_path`.
    /// Returns the path written.
    ///
    /// Members hidden from `user` are left out along with their links.
    pub fn generate_tree_pdf(
        &self,
        user: UserId,
        tree_id: Uuid,
        output_path: &Path,
    ) -> Result<PathBuf, KinshipError> {
        let tree = self.family.tree(user, tree_id)?;
        let members = self.family.tree_members(user, tree_id)?;
        debug!(%user, %tree_id, members = members.len(), "Loaded tree for export");
        self.write_pdf(&tree.name, &members, output_path)
    }

    /// Write already-loaded members to `output_path`.
    pub fn write_pdf(
        &self,
        title: &str,
        members: &[MemberWithEdges],
        output_path: &Path,
    ) -> Result<PathBuf, KinshipError> {
        let layout = build_layout(
            members,
            LayoutSpacing {
                generation: self.config.generation_spacing,
                sibling: self.config.sibling_spacing,
            },
        );
        let writer = self.render(title, &layout);
        writer.write_to(output_path)?;
        info!(
            path = %output_path.display(),
            members = layout.nodes.len(),
            widest_band = layout.max_band_width(),
            pages = writer.page_count(),
            "Exported tree PDF"
        );
        Ok(output_path.to_path_buf())
    }

    /// Generation bands that fit on one page.
    fn bands_per_page(&self) -> usize {
        let usable = self.config.page_height
            - 2.0 * self.config.margin
            - HEADER_HEIGHT
            - FOOTER_HEIGHT
            - BOX_HEIGHT;
        let extra = (usable / self.config.generation_spacing).floor();
        if extra.is_finite() && extra > 0.0 {
            1 + extra as usize
        } else {
            1
        }
    }

    fn render(&self, title: &str, layout: &TreeLayout) -> PdfWriter {
        let cfg = &self.config;
        let mut writer = PdfWriter::new(cfg.page_width, cfg.page_height).with_title(title);

        if layout.is_empty() {
            let mut page = self.page_frame(title, 1, 1);
            page.text(
                cfg.margin,
                cfg.page_height - cfg.margin - HEADER_HEIGHT - cfg.font_size,
                cfg.font_size,
                EMPTY_TREE_MESSAGE,
            );
            writer.add_page(page);
            return writer;
        }

        let per_page = self.bands_per_page();
        let page_count = layout.generations().div_ceil(per_page);
        let boxes = self.place(layout, per_page);

        let mut pages: Vec<Page> = (0..page_count)
            .map(|i| self.page_frame(title, i + 1, page_count))
            .collect();

        for link in &layout.links {
            let (from, to) = (boxes[link.from], boxes[link.to]);
            if from.page != to.page {
                continue;
            }
            let page = &mut pages[from.page];
            match link.kind {
                LinkKind::ParentChild => page.line(from.cx, from.bottom(), to.cx, to.top),
                LinkKind::Peer => {
                    let (left, right) = if from.cx <= to.cx { (from, to) } else { (to, from) };
                    page.set_stroke_gray(0.5);
                    page.line(
                        left.cx + left.width / 2.0,
                        left.mid_y(),
                        right.cx - right.width / 2.0,
                        right.mid_y(),
                    );
                    page.set_stroke_gray(0.0);
                }
            }
        }

        for (node, placed) in layout.nodes.iter().zip(&boxes) {
            self.draw_node(&mut pages[placed.page], node, placed);
        }

        for page in pages {
            writer.add_page(page);
        }
        writer
    }

    /// Page coordinates for every node, in layout order.
    ///
    /// A band wider than the page is compressed: its slots share the usable
    /// width evenly instead of using the configured sibling spacing.
    fn place(&self, layout: &TreeLayout, per_page: usize) -> Vec<NodeBox> {
        let cfg = &self.config;
        let usable_width = cfg.page_width - 2.0 * cfg.margin;
        let top = cfg.page_height - cfg.margin - HEADER_HEIGHT;

        let band_width: Vec<usize> = (0..layout.generations())
            .map(|g| {
                layout
                    .nodes_in_generation(g)
                    .map(|n| n.slot + 1)
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        layout
            .nodes
            .iter()
            .map(|node| {
                let slots = band_width[node.generation] as f64;
                let step = cfg.sibling_spacing.min(usable_width / slots);
                if step < cfg.sibling_spacing {
                    debug!(generation = node.generation, slots, step, "Compressing band");
                }
                let row = node.generation % per_page;
                NodeBox {
                    page: node.generation / per_page,
                    cx: cfg.margin + step * (node.slot as f64 + 0.5),
                    top: top - row as f64 * cfg.generation_spacing,
                    width: BOX_WIDTH.min(step * 0.9),
                }
            })
            .collect()
    }

    fn page_frame(&self, title: &str, number: usize, total: usize) -> Page {
        let cfg = &self.config;
        let mut page = Page::new();
        page.set_line_width(0.8);
        page.text(
            cfg.margin,
            cfg.page_height - cfg.margin - cfg.font_size * 1.6,
            cfg.font_size * 1.6,
            title,
        );
        page.text_centered(
            cfg.page_width / 2.0,
            cfg.margin / 2.0,
            cfg.font_size * 0.8,
            &format!("Page {} of {}", number, total),
        );
        page
    }

    fn draw_node(&self, page: &mut Page, node: &PlacedNode, placed: &NodeBox) {
        let font = self.config.font_size;
        let inner = placed.width - 6.0;
        page.rect(
            placed.cx - placed.width / 2.0,
            placed.bottom(),
            placed.width,
            BOX_HEIGHT,
        );
        page.text_centered(
            placed.cx,
            placed.top - 6.0 - font,
            font,
            &fit_text(&node.full_name, font, inner),
        );
        let years = format_years(node.birth_year, node.death_year);
        if !years.is_empty() {
            let small = font * 0.85;
            page.text_centered(placed.cx, placed.bottom() + 5.0, small, &fit_text(&years, small, inner));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::config::FamilyConfig;
    use kinship_core::types::{AccessRole, Attachment, Member, NewMember, RelationType, Timestamp};
    use kinship_storage::{access, users, Database};

    const OWNER: UserId = UserId(1);
    const GUEST: UserId = UserId(2);

    fn member(name: &str, rt: RelationType) -> Member {
        Member {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            birth_year: Some(1960),
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

    fn family() -> (Arc<Database>, Arc<FamilyService>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let family = Arc::new(FamilyService::new(db.clone(), FamilyConfig::default()));
        (db, family)
    }

    fn exporter(config: RenderConfig) -> TreeExporter {
        TreeExporter::new(family().1, config)
    }

    /// A father and his child, linked.
    fn father_and_child() -> Vec<MemberWithEdges> {
        let father = member("Person 0", RelationType::Father);
        let child = member("Person 1", RelationType::Child);
        vec![
            MemberWithEdges {
                member: father.clone(),
                neighbors: vec![child.id],
            },
            MemberWithEdges {
                member: child,
                neighbors: vec![father.id],
            },
        ]
    }

    fn pdf_text(path: &Path) -> String {
        String::from_utf8(std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_tree_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("empty.pdf");
        let written = exporter(RenderConfig::default())
            .write_pdf("Nobody", &[], &path)
            .unwrap();
        assert_eq!(written, path);

        let pdf = pdf_text(&path);
        assert!(pdf.starts_with("%PDF-1.4"));
        assert!(pdf.contains("/Count 1"));
        assert!(pdf.contains("The family tree is empty."));
    }

    #[test]
    fn test_boxes_names_and_links_drawn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("family.pdf");
        exporter(RenderConfig::default())
            .write_pdf("Karimovs", &father_and_child(), &path)
            .unwrap();

        let pdf = pdf_text(&path);
        assert!(pdf.contains("(Person 0) Tj"));
        assert!(pdf.contains("(Person 1) Tj"));
        assert!(pdf.contains("(b. 1960) Tj"));
        assert_eq!(pdf.matches(" re S").count(), 2);
        assert_eq!(pdf.matches(" l S").count(), 1);
    }

    #[test]
    fn test_bands_per_page() {
        let exp = exporter(RenderConfig::default());
        // 842 - 2*40 - 30 - 16 - 34 = 682 usable, 682 / 110 = 6 extra bands.
        assert_eq!(exp.bands_per_page(), 7);

        let cramped = exporter(RenderConfig {
            generation_spacing: 700.0,
            ..RenderConfig::default()
        });
        assert_eq!(cramped.bands_per_page(), 1);
    }

    #[test]
    fn test_bands_split_across_pages() {
        let exp = exporter(RenderConfig {
            generation_spacing: 700.0,
            ..RenderConfig::default()
        });
        let layout = build_layout(&father_and_child(), LayoutSpacing::default());
        assert_eq!(layout.generations(), 2);

        let writer = exp.render("Deep", &layout);
        assert_eq!(writer.page_count(), 2);

        let pdf = String::from_utf8(writer.to_bytes()).unwrap();
        assert!(pdf.contains("(Page 2 of 2) Tj"));
        assert_eq!(pdf.matches(" re S").count(), 2);
        // The link that crosses the page break is dropped.
        assert_eq!(pdf.matches(" l S").count(), 0);
    }

    #[test]
    fn test_wide_band_is_compressed_to_fit() {
        let exp = exporter(RenderConfig::default());
        let members: Vec<MemberWithEdges> = (0..12)
            .map(|i| MemberWithEdges {
                member: member(&format!("S{}", i), RelationType::Sibling),
                neighbors: Vec::new(),
            })
            .collect();
        let layout = build_layout(&members, LayoutSpacing::default());
        let boxes = exp.place(&layout, exp.bands_per_page());

        let right_edge = exp.config.page_width - exp.config.margin;
        for b in &boxes {
            assert!(b.cx + b.width / 2.0 <= right_edge + 1e-6);
            assert!(b.cx - b.width / 2.0 >= exp.config.margin - 1e-6);
        }
    }

    #[test]
    fn test_generate_tree_pdf_missing_tree() {
        let dir = tempfile::tempdir().unwrap();
        let err = exporter(RenderConfig::default())
            .generate_tree_pdf(OWNER, Uuid::new_v4(), &dir.path().join("x.pdf"))
            .unwrap_err();
        assert!(matches!(err, KinshipError::NotFound { .. }));
    }

    #[test]
    fn test_private_members_left_out_for_viewers() {
        let (db, family) = family();
        let father = family
            .add_member(OWNER, NewMember::new("Vali", Some(1960), RelationType::Father), None)
            .unwrap();
        let mut secret = NewMember::new("SecretKid", Some(1990), RelationType::Child);
        secret.is_private = true;
        family
            .add_member(
                OWNER,
                secret,
                Some(Attachment {
                    role: RelationType::Child,
                    anchor: father.id,
                }),
            )
            .unwrap();
        let tree_id = father.tree_id.unwrap();
        db.with_conn(|conn| {
            users::upsert(conn, GUEST, "guest")?;
            access::grant(conn, tree_id, GUEST, AccessRole::Viewer)
        })
        .unwrap();

        let exporter = TreeExporter::new(family, RenderConfig::default());
        let dir = tempfile::tempdir().unwrap();

        let guest_path = dir.path().join("guest.pdf");
        exporter.generate_tree_pdf(GUEST, tree_id, &guest_path).unwrap();
        let pdf = pdf_text(&guest_path);
        assert!(pdf.contains("(Vali) Tj"));
        assert!(!pdf.contains("SecretKid"));
        assert_eq!(pdf.matches(" re S").count(), 1);
        assert_eq!(pdf.matches(" l S").count(), 0);

        let owner_path = dir.path().join("owner.pdf");
        exporter.generate_tree_pdf(OWNER, tree_id, &owner_path).unwrap();
        let pdf = pdf_text(&owner_path);
        assert!(pdf.contains("(SecretKid) Tj"));
        assert_eq!(pdf.matches(" l S").count(), 1);
    }

    #[test]
    fn test_export_requires_access() {
        let (_db, family) = family();
        let tree = family.create_tree(OWNER, "Karimovs", None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = TreeExporter::new(family, RenderConfig::default())
            .generate_tree_pdf(GUEST, tree.id, &dir.path().join("x.pdf"))
            .unwrap_err();
        assert!(matches!(err, KinshipError::Unauthorized(_)));
    }
}
