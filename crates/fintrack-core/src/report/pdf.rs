//! Minimal PDF 1.4 writer for report documents
//!
//! Uses the three standard Type 1 fonts so no font data is embedded. Text is
//! laid out top-down on A4 pages; tables are set in Courier so columns line
//! up without glyph metrics.

use std::fmt::Write as _;

use super::{Block, ReportDocument, ReportRenderer};
use crate::error::{Error, Result};

const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN: f64 = 50.0;

const BODY_SIZE: f64 = 10.0;
const TABLE_SIZE: f64 = 8.0;
/// Courier advance is 600/1000 em
const COURIER_ADVANCE: f64 = 0.6;
/// Rough average Helvetica advance, used only for wrapping
const HELVETICA_ADVANCE: f64 = 0.5;
const MAX_COLUMN_CHARS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Font {
    Regular,
    Bold,
    Italic,
    Mono,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
            Font::Mono => "F4",
        }
    }
}

const FONTS: [(&str, &str); 4] = [
    ("F1", "Helvetica"),
    ("F2", "Helvetica-Bold"),
    ("F3", "Helvetica-Oblique"),
    ("F4", "Courier"),
];

#[derive(Debug, Clone)]
struct Line {
    font: Font,
    size: f64,
    text: String,
    centered: bool,
    accent: bool,
    /// Vertical space taken before the baseline
    leading: f64,
}

impl Line {
    fn new(font: Font, size: f64, text: impl Into<String>) -> Self {
        Self {
            font,
            size,
            text: text.into(),
            centered: false,
            accent: false,
            leading: size * 1.4,
        }
    }

    fn gap(points: f64) -> Self {
        Self {
            font: Font::Regular,
            size: BODY_SIZE,
            text: String::new(),
            centered: false,
            accent: false,
            leading: points,
        }
    }

    fn width(&self) -> f64 {
        let advance = match self.font {
            Font::Mono => COURIER_ADVANCE,
            _ => HELVETICA_ADVANCE,
        };
        self.text.chars().count() as f64 * self.size * advance
    }
}

/// Renders [`ReportDocument`]s as PDF
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl ReportRenderer for PdfRenderer {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>> {
        let lines = layout(document);
        let pages = paginate(&lines);
        write_pdf(&document.title, &pages)
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }
}

fn usable_width() -> f64 {
    PAGE_WIDTH - 2.0 * MARGIN
}

fn wrap(text: &str, size: f64) -> Vec<String> {
    let max_chars = (usable_width() / (size * HELVETICA_ADVANCE)).floor().max(10.0) as usize;
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn fit(cell: &str, width: usize) -> String {
    let count = cell.chars().count();
    if count <= width {
        format!("{:<width$}", cell, width = width)
    } else {
        let mut truncated: String = cell.chars().take(width.saturating_sub(1)).collect();
        truncated.push('~');
        truncated
    }
}

fn table_lines(headers: &[String], rows: &[Vec<String>]) -> Vec<Line> {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    let max_total = (usable_width() / (TABLE_SIZE * COURIER_ADVANCE)).floor() as usize;
    let gutters = columns.saturating_sub(1) * 2;
    let cap = if widths.iter().sum::<usize>() + gutters > max_total {
        MAX_COLUMN_CHARS
    } else {
        usize::MAX
    };
    for w in &mut widths {
        *w = (*w).min(cap);
    }

    let format_row = |cells: &[String]| -> String {
        (0..columns)
            .map(|i| fit(cells.get(i).map(String::as_str).unwrap_or(""), widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![Line::new(Font::Mono, TABLE_SIZE, format_row(headers))];
    let rule_len = widths.iter().sum::<usize>() + gutters;
    lines.push(Line::new(Font::Mono, TABLE_SIZE, "-".repeat(rule_len)));
    for row in rows {
        lines.push(Line::new(Font::Mono, TABLE_SIZE, format_row(row)));
    }
    lines
}

fn layout(document: &ReportDocument) -> Vec<Line> {
    let mut lines = Vec::new();
    for block in &document.blocks {
        match block {
            Block::Title { text, accent } => {
                let mut line = Line::new(Font::Bold, 16.0, text.clone());
                line.centered = true;
                line.accent = *accent;
                lines.push(line);
            }
            Block::Heading(text) => {
                lines.push(Line::gap(6.0));
                lines.push(Line::new(Font::Bold, 13.0, text.clone()));
            }
            Block::Paragraph(text) => {
                for part in wrap(text, BODY_SIZE) {
                    lines.push(Line::new(Font::Regular, BODY_SIZE, part));
                }
            }
            Block::Fields(fields) => {
                for (label, value) in fields {
                    lines.push(Line::new(
                        Font::Regular,
                        BODY_SIZE,
                        format!("{}: {}", label, value),
                    ));
                }
            }
            Block::Table { headers, rows } => lines.extend(table_lines(headers, rows)),
            Block::Spacer => lines.push(Line::gap(12.0)),
            Block::Footer(text) => {
                let mut line = Line::new(Font::Italic, 9.0, text.clone());
                line.centered = true;
                lines.push(line);
            }
        }
    }
    lines
}

fn paginate(lines: &[Line]) -> Vec<Vec<(f64, Line)>> {
    let mut pages = Vec::new();
    let mut page = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        if y - line.leading < MARGIN && !page.is_empty() {
            pages.push(std::mem::take(&mut page));
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= line.leading;
        if !line.text.is_empty() {
            page.push((y, line.clone()));
        }
    }
    if !page.is_empty() || pages.is_empty() {
        pages.push(page);
    }
    pages
}

/// Escape a string for a PDF literal; non-Latin-1 characters become `?`
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            c if (c as u32) >= 0xA0 && (c as u32) <= 0xFF => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

fn content_stream(page: &[(f64, Line)]) -> String {
    let mut stream = String::new();
    for (y, line) in page {
        let x = if line.centered {
            ((PAGE_WIDTH - line.width()) / 2.0).max(MARGIN)
        } else {
            MARGIN
        };
        let color = if line.accent { "0 0.2 0.4 rg" } else { "0 0 0 rg" };
        let _ = writeln!(
            stream,
            "BT {} /{} {} Tf {:.2} {:.2} Td ({}) Tj ET",
            color,
            line.font.resource(),
            line.size,
            x,
            y,
            escape(&line.text)
        );
    }
    stream
}

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    /// Objects must be added in id order starting at 1
    fn object(&mut self, id: usize, body: &str) -> Result<()> {
        if id != self.offsets.len() + 1 {
            return Err(Error::Report(format!("PDF object {} out of order", id)));
        }
        self.offsets.push(self.buf.len());
        self.buf
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
        Ok(())
    }

    fn finish(mut self, root: usize, info: usize) -> Vec<u8> {
        let xref_at = self.buf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", self.offsets.len() + 1);
        for offset in &self.offsets {
            let _ = writeln!(xref, "{:010} 00000 n ", offset);
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            self.offsets.len() + 1,
            root,
            info,
            xref_at
        );
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}

fn write_pdf(title: &str, pages: &[Vec<(f64, Line)>]) -> Result<Vec<u8>> {
    // 1 catalog, 2 page tree, 3 info, 4..8 fonts, then page/content pairs
    let font_base = 4;
    let page_base = font_base + FONTS.len();
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| page_base + i * 2).collect();

    let mut pdf = PdfWriter::new();
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>")?;
    let kids = page_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");
    pdf.object(
        2,
        &format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()),
    )?;
    pdf.object(
        3,
        &format!("<< /Title ({}) /Producer (fintrack) >>", escape(title)),
    )?;

    let mut font_refs = String::new();
    for (i, (name, base)) in FONTS.iter().enumerate() {
        let id = font_base + i;
        pdf.object(
            id,
            &format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                base
            ),
        )?;
        let _ = write!(font_refs, "/{} {} 0 R ", name, id);
    }

    for (page, id) in pages.iter().zip(&page_ids) {
        pdf.object(
            *id,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << {}>> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                font_refs,
                id + 1
            ),
        )?;
        let stream = content_stream(page);
        pdf.object(
            id + 1,
            &format!(
                "<< /Length {} >>\nstream\n{}endstream",
                stream.len(),
                stream
            ),
        )?;
    }

    Ok(pdf.finish(1, 3))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_paragraphs(count: usize) -> ReportDocument {
        let mut doc = ReportDocument::new("Test");
        doc.push(Block::Title {
            text: "Credit Report".to_string(),
            accent: true,
        });
        for i in 0..count {
            doc.push(Block::Paragraph(format!("Line number {}", i)));
        }
        doc
    }

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn test_single_page_structure() {
        let bytes = PdfRenderer.render(&doc_with_paragraphs(3)).unwrap();
        let text = as_text(&bytes);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("(Credit Report) Tj"));
        assert!(text.contains("/BaseFont /Helvetica-Bold"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let bytes = PdfRenderer.render(&doc_with_paragraphs(5)).unwrap();
        // Everything after the binary comment line is ASCII
        let tail = as_text(&bytes[bytes.len() - 40..]);
        let startxref = tail.rfind("startxref\n").unwrap();
        let xref_at: usize = tail[startxref + 10..]
            .lines()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        let xref = as_text(&bytes[xref_at..]);
        assert!(xref.starts_with("xref"));

        let entries: Vec<&str> = xref.lines().skip(3).take(3).collect();
        for (i, entry) in entries.iter().enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            assert!(bytes[offset..].starts_with(format!("{} 0 obj", i + 1).as_bytes()));
        }
    }

    #[test]
    fn test_long_documents_span_pages() {
        let bytes = PdfRenderer.render(&doc_with_paragraphs(120)).unwrap();
        let text = as_text(&bytes);
        assert!(!text.contains("/Count 1 "));
        assert!(text.contains("/Count 2") || text.contains("/Count 3"));
        assert!(text.contains("(Line number 119) Tj"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape("Ksh 1,000"), "Ksh 1,000");
        assert_eq!(escape("caf\u{e9}"), "caf\\351");
        assert_eq!(escape("\u{2713}"), "?");
    }

    #[test]
    fn test_wrap_respects_width() {
        let long = "word ".repeat(100);
        let lines = wrap(&long, BODY_SIZE);
        assert!(lines.len() > 1);
        let max = (usable_width() / (BODY_SIZE * HELVETICA_ADVANCE)) as usize;
        assert!(lines.iter().all(|l| l.chars().count() <= max));
    }

    #[test]
    fn test_wide_tables_are_truncated() {
        let headers: Vec<String> = (0..9).map(|i| format!("Column {}", i)).collect();
        let rows = vec![(0..9).map(|_| "x".repeat(40)).collect::<Vec<_>>()];
        let lines = table_lines(&headers, &rows);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].text.contains('~'));
        assert!(!lines[2].text.contains(&"x".repeat(MAX_COLUMN_CHARS + 1)));
    }
}
