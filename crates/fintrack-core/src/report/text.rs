use super::{Block, ReportDocument, ReportRenderer};
use crate::error::Result;

/// Plain-text rendering, used for email bodies and terminals
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn render_string(&self, document: &ReportDocument) -> String {
        let mut out = String::new();
        for block in &document.blocks {
            match block {
                Block::Title { text, .. } => {
                    out.push_str(text);
                    out.push('\n');
                    out.push_str(&"=".repeat(text.chars().count()));
                    out.push('\n');
                }
                Block::Heading(text) => {
                    out.push('\n');
                    out.push_str(text);
                    out.push('\n');
                    out.push_str(&"-".repeat(text.chars().count()));
                    out.push('\n');
                }
                Block::Paragraph(text) | Block::Footer(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                Block::Fields(fields) => {
                    for (label, value) in fields {
                        out.push_str(&format!("{}: {}\n", label, value));
                    }
                }
                Block::Table { headers, rows } => {
                    let mut widths: Vec<usize> =
                        headers.iter().map(|h| h.chars().count()).collect();
                    for row in rows {
                        for (w, cell) in widths.iter_mut().zip(row) {
                            *w = (*w).max(cell.chars().count());
                        }
                    }
                    let line = |cells: &[String]| {
                        cells
                            .iter()
                            .zip(&widths)
                            .map(|(c, w)| format!("{:<w$}", c, w = *w))
                            .collect::<Vec<_>>()
                            .join(" | ")
                            .trim_end()
                            .to_string()
                    };
                    out.push_str(&line(headers));
                    out.push('\n');
                    for row in rows {
                        out.push_str(&line(row));
                        out.push('\n');
                    }
                }
                Block::Spacer => out.push('\n'),
            }
        }
        out
    }
}

impl ReportRenderer for TextRenderer {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>> {
        Ok(self.render_string(document).into_bytes())
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }
}
