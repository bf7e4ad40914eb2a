//! Kinship render: text and PDF views of a family tree.

pub mod export;
pub mod pdf;
pub mod text;

pub use export::TreeExporter;
pub use pdf::{Page, PdfWriter};
pub use text::{format_years, generate_text_tree, EMPTY_TREE_MESSAGE};
