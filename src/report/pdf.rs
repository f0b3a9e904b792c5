//! Minimal flowing-text PDF layout on top of printpdf.
//!
//! A [`ReportDocument`] is a flat list of blocks. Layout happens in two passes:
//! blocks are first placed on A4 pages, then the pages are drawn with a
//! `page / total` footer once the page count is known.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
};
use tracing::{debug, warn};

use crate::error::{ApiError, Result};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const FOOTER_Y: f32 = 10.0;
const BODY_SIZE: f32 = 11.0;
const PT_TO_MM: f32 = 0.3528;
const IMAGE_DPI: f32 = 300.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Large centered heading.
    Title(String),
    /// Section heading at the given font size.
    Heading(String, f32),
    /// Body text. Embedded newlines start new lines.
    Paragraph(String),
    Bullet(String),
    /// PNG image scaled to the text width. Unreadable images are skipped.
    Image(PathBuf),
    /// Vertical gap in millimetres.
    Spacer(f32),
    PageBreak,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl ReportDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn heading(&mut self, text: impl Into<String>, size: f32) -> &mut Self {
        self.push(Block::Heading(text.into(), size))
    }

    pub fn paragraph(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Block::Paragraph(text.into()))
    }

    pub fn bullet(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Block::Bullet(text.into()))
    }

    /// Plain text of every text block, one block per line.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            let line = match block {
                Block::Title(t) | Block::Heading(t, _) | Block::Paragraph(t) => t.clone(),
                Block::Bullet(t) => format!("- {}", t),
                _ => continue,
            };
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

enum Placed {
    Text {
        text: String,
        size: f32,
        x: f32,
        y: f32,
        bold: bool,
    },
    Image {
        image: Image,
        x: f32,
        y: f32,
        scale: f32,
    },
}

/// Renders [`ReportDocument`]s to PDF bytes.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    font_path: Option<PathBuf>,
}

impl PdfRenderer {
    /// Body text uses the TrueType font at `font_path` when it can be loaded,
    /// Helvetica otherwise.
    pub fn new(font_path: Option<PathBuf>) -> Self {
        Self { font_path }
    }

    pub fn render(&self, document: &ReportDocument) -> Result<Vec<u8>> {
        self.build(document)?.save_to_bytes().map_err(render_error)
    }

    /// Write the rendered document straight to `path`.
    pub fn render_to_path(&self, document: &ReportDocument, path: &Path) -> Result<()> {
        let doc = self.build(document)?;
        let mut out = BufWriter::new(File::create(path)?);
        doc.save(&mut out).map_err(render_error)?;
        out.flush()?;
        debug!(path = %path.display(), "Wrote PDF");
        Ok(())
    }

    fn build(&self, document: &ReportDocument) -> Result<PdfDocumentReference> {
        let pages = layout(&document.blocks);
        let total = pages.len();

        let (doc, first_page, first_layer) = PdfDocument::new(
            document.title.as_str(),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Layer 1",
        );
        let body_font = self.body_font(&doc)?;
        let bold_font = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(render_error)?;

        for (index, items) in pages.into_iter().enumerate() {
            let layer = if index == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
                doc.get_page(page).get_layer(layer)
            };

            for item in items {
                match item {
                    Placed::Text {
                        text,
                        size,
                        x,
                        y,
                        bold,
                    } => {
                        let font = if bold { &bold_font } else { &body_font };
                        layer.use_text(text, size, Mm(x), Mm(y), font);
                    }
                    Placed::Image { image, x, y, scale } => image.add_to_layer(
                        layer.clone(),
                        ImageTransform {
                            translate_x: Some(Mm(x)),
                            translate_y: Some(Mm(y)),
                            scale_x: Some(scale),
                            scale_y: Some(scale),
                            dpi: Some(IMAGE_DPI),
                            ..Default::default()
                        },
                    ),
                }
            }

            let footer = format!("{} / {}", index + 1, total);
            let x = (PAGE_WIDTH - text_width(&footer, 9.0)) / 2.0;
            layer.use_text(footer, 9.0, Mm(x), Mm(FOOTER_Y), &body_font);
        }

        debug!(pages = total, "Rendered PDF");
        Ok(doc)
    }

    fn body_font(&self, doc: &PdfDocumentReference) -> Result<IndirectFontRef> {
        if let Some(path) = &self.font_path {
            match File::open(path) {
                Ok(file) => match doc.add_external_font(BufReader::new(file)) {
                    Ok(font) => return Ok(font),
                    Err(e) => warn!(path = %path.display(), error = ?e, "Unusable report font"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "Report font not found"),
            }
        }
        doc.add_builtin_font(BuiltinFont::Helvetica)
            .map_err(render_error)
    }
}

fn render_error(e: impl std::fmt::Debug) -> ApiError {
    ApiError::Render(format!("{:?}", e))
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.35
}

/// Approximate width of `text` in millimetres for a proportional font.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * PT_TO_MM
}

/// Greedy word wrap to lines of at most `max_chars` characters. Words longer
/// than a line are split.
pub(crate) fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let mut line = String::new();
        for word in raw.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    lines
}

struct Cursor {
    pages: Vec<Vec<Placed>>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn current_is_empty(&self) -> bool {
        self.pages.last().map_or(true, |p| p.is_empty())
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Moves down by `height`, starting a new page when it would not fit.
    fn reserve(&mut self, height: f32) {
        if self.y - height < MARGIN + FOOTER_Y && !self.current_is_empty() {
            self.new_page();
        }
        self.y -= height;
    }

    fn place(&mut self, item: Placed) {
        if let Some(page) = self.pages.last_mut() {
            page.push(item);
        }
    }

    fn text(&mut self, text: &str, size: f32, indent: f32, bold: bool, centered: bool) {
        let available = PAGE_WIDTH - 2.0 * MARGIN - indent;
        let max_chars = (available / (size * 0.5 * PT_TO_MM)) as usize;
        for line in wrap(text, max_chars) {
            self.reserve(line_height(size));
            let x = if centered {
                (PAGE_WIDTH - text_width(&line, size)).max(2.0 * MARGIN) / 2.0
            } else {
                MARGIN + indent
            };
            if !line.is_empty() {
                let y = self.y;
                self.place(Placed::Text {
                    text: line,
                    size,
                    x,
                    y,
                    bold,
                });
            }
        }
    }

    fn image(&mut self, path: &Path) {
        let image = match load_png(path) {
            Ok(image) => image,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping report image");
                return;
            }
        };
        let natural_width = image.image.width.0 as f32 * 25.4 / IMAGE_DPI;
        let natural_height = image.image.height.0 as f32 * 25.4 / IMAGE_DPI;
        if natural_width <= 0.0 || natural_height <= 0.0 {
            return;
        }
        let max_width = PAGE_WIDTH - 2.0 * MARGIN;
        let max_height = PAGE_HEIGHT - 2.0 * MARGIN - FOOTER_Y;
        let scale = (max_width / natural_width).min(max_height / natural_height);
        let width = natural_width * scale;
        let height = natural_height * scale;

        self.reserve(height);
        let (x, y) = ((PAGE_WIDTH - width) / 2.0, self.y);
        self.place(Placed::Image { image, x, y, scale });
    }
}

fn load_png(path: &Path) -> Result<Image> {
    let reader = BufReader::new(File::open(path)?);
    let decoder = PngDecoder::new(reader).map_err(render_error)?;
    Image::try_from(decoder).map_err(render_error)
}

fn layout(blocks: &[Block]) -> Vec<Vec<Placed>> {
    let mut cursor = Cursor::new();
    for block in blocks {
        match block {
            Block::Title(text) => {
                cursor.text(text, 32.0, 0.0, true, true);
                cursor.reserve(line_height(BODY_SIZE) * 2.0);
            }
            Block::Heading(text, size) => {
                cursor.reserve(line_height(BODY_SIZE) * 0.5);
                cursor.text(text, *size, 0.0, true, false);
            }
            Block::Paragraph(text) => cursor.text(text, BODY_SIZE, 0.0, false, false),
            Block::Bullet(text) => cursor.text(&format!("- {}", text), BODY_SIZE, 2.0, false, false),
            Block::Image(path) => cursor.image(path),
            Block::Spacer(height) => cursor.reserve(*height),
            Block::PageBreak => cursor.new_page(),
        }
    }
    cursor.pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_and_newlines() {
        let lines = wrap("alpha beta gamma\ndelta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma", "delta"]);
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("", 10), vec![""]);
    }

    #[test]
    fn long_documents_span_pages() {
        let mut doc = ReportDocument::new("Long");
        for i in 0..200 {
            doc.paragraph(format!("Paragraph {}", i));
        }
        doc.push(Block::PageBreak).paragraph("last");
        let pages = layout(&doc.blocks);
        assert!(pages.len() > 2);
        assert_eq!(pages.last().map(|p| p.len()), Some(1));
    }

    #[test]
    fn renders_pdf_bytes() {
        let mut doc = ReportDocument::new("Test");
        doc.push(Block::Title("Test".into()))
            .push(Block::Image(PathBuf::from("does/not/exist.png")))
            .heading("Section", 24.0)
            .bullet("item");
        let bytes = PdfRenderer::new(Some(PathBuf::from("missing.ttf")))
            .render(&doc)
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let mut doc = ReportDocument::new("File");
        doc.heading("Services", 24.0).bullet("vpc");
        PdfRenderer::default().render_to_path(&doc, &path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn plain_text_lists_text_blocks() {
        let mut doc = ReportDocument::new("T");
        doc.heading("Services", 24.0).bullet("vpc").push(Block::PageBreak);
        assert_eq!(doc.plain_text(), "Services\n- vpc\n");
    }
}
