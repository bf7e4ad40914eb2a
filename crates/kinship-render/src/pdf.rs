//! Minimal PDF 1.4 writer.
//!
//! Enough of the format to draw text, lines and rectangles on fixed-size
//! pages with the built-in Helvetica font. Text is encoded as WinAnsi;
//! characters outside Latin-1 are replaced by `?`.

use std::fmt::Write as _;
use std::path::Path;

/// Rough Helvetica advance width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f64 = 0.52;

/// Estimated rendered width of `text` at `font_size`.
pub fn text_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * AVG_GLYPH_WIDTH
}

/// Shorten `text` with a trailing ".." so it fits in `max_width`.
pub fn fit_text(text: &str, font_size: f64, max_width: f64) -> String {
    if text_width(text, font_size) <= max_width {
        return text.to_string();
    }
    let max_chars = (max_width / (font_size * AVG_GLYPH_WIDTH)).floor() as usize;
    if max_chars <= 2 {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - 2).collect();
    out.push_str("..");
    out
}

/// One page's content stream. Coordinates are PDF points from the
/// bottom-left corner.
#[derive(Debug, Default, Clone)]
pub struct Page {
    ops: String,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, x: f64, y: f64, font_size: f64, text: &str) {
        let _ = writeln!(
            self.ops,
            "BT /F1 {} Tf {} {} Td ({}) Tj ET",
            num(font_size),
            num(x),
            num(y),
            encode_text(text)
        );
    }

    /// Text horizontally centred on `cx`.
    pub fn text_centered(&mut self, cx: f64, y: f64, font_size: f64, text: &str) {
        let x = cx - text_width(text, font_size) / 2.0;
        self.text(x, y, font_size, text);
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let _ = writeln!(
            self.ops,
            "{} {} m {} {} l S",
            num(x1),
            num(y1),
            num(x2),
            num(y2)
        );
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let _ = writeln!(
            self.ops,
            "{} {} {} {} re S",
            num(x),
            num(y),
            num(width),
            num(height)
        );
    }

    pub fn set_line_width(&mut self, width: f64) {
        let _ = writeln!(self.ops, "{} w", num(width));
    }

    /// Stroke grey level, 0 black to 1 white.
    pub fn set_stroke_gray(&mut self, level: f64) {
        let _ = writeln!(self.ops, "{} G", num(level.clamp(0.0, 1.0)));
    }
}

/// Collects pages and serialises them into a PDF file.
#[derive(Debug)]
pub struct PdfWriter {
    width: f64,
    height: f64,
    title: String,
    pages: Vec<Page>,
}

impl PdfWriter {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            title: String::new(),
            pages: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serialise the document. A writer with no pages produces one blank page.
    pub fn to_bytes(&self) -> Vec<u8> {
        let blank = [Page::new()];
        let pages: &[Page] = if self.pages.is_empty() {
            &blank
        } else {
            &self.pages
        };

        // Object layout: 1 catalog, 2 page tree, 3 font, 4 info,
        // then a (page, content) pair per page.
        let page_obj = |i: usize| 5 + 2 * i;
        let mut objects: Vec<String> = Vec::with_capacity(4 + 2 * pages.len());

        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", page_obj(i)))
            .collect();
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ));
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );
        objects.push(format!(
            "<< /Title ({}) /Producer (kinship) >>",
            encode_text(&self.title)
        ));

        for (i, page) in pages.iter().enumerate() {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                num(self.width),
                num(self.height),
                page_obj(i) + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                page.ops.len(),
                page.ops
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
        }

        let xref_offset = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in &offsets {
            let _ = write!(out, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R /Info 4 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        );
        out.into_bytes()
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes())
    }
}

/// Format a coordinate without trailing zeros.
fn num(v: f64) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Encode a string for a PDF literal string in WinAnsi. Everything emitted
/// is 7-bit ASCII: Latin-1 characters become octal escapes.
fn encode_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_encode_text() {
        assert_eq!(encode_text("Vali (1960)"), "Vali \\(1960\\)");
        assert_eq!(encode_text("a\\b"), "a\\\\b");
        assert_eq!(encode_text("Gül"), "G\\374l");
        assert_eq!(encode_text("Олим"), "????");
        assert_eq!(encode_text("tab\there"), "tab?here");
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(40.0), "40");
        assert_eq!(num(12.5), "12.5");
        assert_eq!(num(1.239), "1.24");
        assert_eq!(num(-0.001), "0");
    }

    #[test]
    fn test_fit_text() {
        assert_eq!(fit_text("Ali", 10.0, 100.0), "Ali");
        let fitted = fit_text("Abdulazizkhon Karimov", 10.0, 53.0);
        assert_eq!(fitted, "Abdulazi..");
        assert!(text_width(&fitted, 10.0) <= 53.0);
    }

    #[test]
    fn test_document_structure() {
        let mut page = Page::new();
        page.text(10.0, 20.0, 9.0, "Hello");
        page.line(0.0, 0.0, 10.0, 10.0);
        let mut writer = PdfWriter::new(595.0, 842.0).with_title("Test");
        writer.add_page(page);
        writer.add_page(Page::new());

        let pdf = as_text(&writer.to_bytes());
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.ends_with("%%EOF\n"));
        assert!(pdf.contains("/Count 2"));
        assert!(pdf.contains("(Hello) Tj"));
        assert!(pdf.contains("/MediaBox [0 0 595 842]"));
        assert!(pdf.contains("/BaseFont /Helvetica"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let mut writer = PdfWriter::new(200.0, 200.0);
        let mut page = Page::new();
        page.rect(1.0, 1.0, 5.0, 5.0);
        writer.add_page(page);
        let bytes = writer.to_bytes();
        let pdf = as_text(&bytes);

        let startxref: usize = pdf
            .rsplit("startxref\n")
            .next()
            .unwrap()
            .lines()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(pdf[startxref..].starts_with("xref\n"));

        let entries: Vec<&str> = pdf[startxref..]
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .collect();
        assert_eq!(entries.len(), 6);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.len() + 1, 20, "xref entries are 20 bytes");
            let offset: usize = entry[..10].parse().unwrap();
            assert!(pdf[offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn test_stream_length_matches() {
        let mut page = Page::new();
        page.text(0.0, 0.0, 9.0, "x");
        let expected = page.ops.len();
        let mut writer = PdfWriter::new(100.0, 100.0);
        writer.add_page(page);
        let pdf = as_text(&writer.to_bytes());
        assert!(pdf.contains(&format!("<< /Length {} >>", expected)));
    }

    #[test]
    fn test_empty_writer_emits_one_page() {
        let writer = PdfWriter::new(100.0, 100.0);
        assert_eq!(writer.page_count(), 0);
        let pdf = as_text(&writer.to_bytes());
        assert!(pdf.contains("/Count 1"));
    }
}
