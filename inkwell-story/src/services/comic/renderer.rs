//! Comic document rendering
//!
//! A [`ComicDocument`] is the rendering-backend-neutral description of a
//! comic: a title and an ordered list of panels. [`PdfComicRenderer`] lays it
//! out on A4 pages: a title page, then panels stacked top to bottom, each an
//! image box (or an empty placeholder frame) followed by its caption.

use image::DynamicImage;
use inkwell_common::{Error, Result};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point,
};
use std::path::{Path, PathBuf};
use tracing::warn;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const PANEL_WIDTH_MM: f32 = 180.0;
const PANEL_HEIGHT_MM: f32 = 100.0;
const CAPTION_GAP_MM: f32 = 5.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const SECTION_GAP_MM: f32 = 10.0;
const TITLE_FONT_SIZE: f32 = 16.0;
const CAPTION_FONT_SIZE: f32 = 12.0;
const IMAGE_DPI: f32 = 300.0;
/// Caption characters per line at 12pt Helvetica across the panel width
const CAPTION_WRAP_CHARS: usize = 85;

/// One illustrated section of a comic
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// Resolved image file; `None` renders a placeholder frame
    pub image: Option<PathBuf>,
    pub caption: String,
}

/// Everything needed to render one comic
#[derive(Debug, Clone, PartialEq)]
pub struct ComicDocument {
    pub title: String,
    pub panels: Vec<Panel>,
}

/// Turns a [`ComicDocument`] into downloadable bytes
///
/// Rendering is CPU and file bound; callers run it on a blocking thread.
pub trait ComicRenderer: Send + Sync {
    fn render(&self, document: &ComicDocument) -> Result<Vec<u8>>;

    /// MIME type of the rendered bytes
    fn content_type(&self) -> &'static str;

    /// File extension (without dot) of stored artifacts
    fn extension(&self) -> &'static str;
}

/// A4 PDF renderer using builtin Helvetica fonts
#[derive(Debug, Default, Clone)]
pub struct PdfComicRenderer;

impl PdfComicRenderer {
    pub fn new() -> Self {
        Self
    }
}

struct PageCursor {
    layer: PdfLayerReference,
    /// Distance of the next free line from the page bottom
    y: f32,
}

impl ComicRenderer for PdfComicRenderer {
    fn render(&self, document: &ComicDocument) -> Result<Vec<u8>> {
        let (doc, page, layer) = PdfDocument::new(
            document.title.as_str(),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Layer 1",
        );
        let title_font = builtin_font(&doc, BuiltinFont::HelveticaBold)?;
        let body_font = builtin_font(&doc, BuiltinFont::Helvetica)?;

        let title_layer = doc.get_page(page).get_layer(layer);
        title_layer.use_text(
            document.title.as_str(),
            TITLE_FONT_SIZE,
            Mm(MARGIN_MM),
            Mm(PAGE_HEIGHT_MM - MARGIN_MM - 10.0),
            &title_font,
        );

        let mut cursor: Option<PageCursor> = None;

        for (index, panel) in document.panels.iter().enumerate() {
            let lines = wrap_text(&panel.caption, CAPTION_WRAP_CHARS);
            let needed = PANEL_HEIGHT_MM
                + CAPTION_GAP_MM
                + lines.len() as f32 * LINE_HEIGHT_MM
                + SECTION_GAP_MM;

            let fits = cursor
                .as_ref()
                .map(|c| c.y - needed >= MARGIN_MM)
                .unwrap_or(false);
            if !fits {
                cursor = Some(new_page(&doc, format!("Panel {}", index + 1)));
            }

            let Some(current) = cursor.as_mut() else {
                return Err(Error::Render("no page available for panel".to_string()));
            };

            let panel_bottom = current.y - PANEL_HEIGHT_MM;
            match panel.image.as_deref().and_then(load_image) {
                Some(img) => draw_image(&current.layer, img, panel_bottom),
                None => draw_placeholder(&current.layer, panel_bottom),
            }

            let first_line_y = panel_bottom - CAPTION_GAP_MM - LINE_HEIGHT_MM;
            let mut last_y = first_line_y + LINE_HEIGHT_MM;
            for (line, (new_page_first, y)) in lines
                .iter()
                .zip(caption_baselines(first_line_y, lines.len()))
            {
                if new_page_first {
                    *current = new_page(&doc, format!("Panel {} (cont.)", index + 1));
                }
                current.layer.use_text(
                    line.as_str(),
                    CAPTION_FONT_SIZE,
                    Mm(MARGIN_MM),
                    Mm(y),
                    &body_font,
                );
                last_y = y;
            }

            current.y = last_y - SECTION_GAP_MM;
        }

        doc.save_to_bytes()
            .map_err(|e| Error::Render(format!("PDF serialization failed: {:?}", e)))
    }

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }
}

fn new_page(doc: &PdfDocumentReference, name: String) -> PageCursor {
    let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), name);
    PageCursor {
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    }
}

/// Baselines for `count` caption lines starting at `first_y`
///
/// Each entry says whether a fresh page starts before the line. Long
/// captions continue at the top of the next page instead of running past
/// the bottom margin.
fn caption_baselines(first_y: f32, count: usize) -> Vec<(bool, f32)> {
    let mut baselines = Vec::with_capacity(count);
    let mut y = first_y;
    for _ in 0..count {
        if y < MARGIN_MM {
            y = PAGE_HEIGHT_MM - MARGIN_MM - LINE_HEIGHT_MM;
            baselines.push((true, y));
        } else {
            baselines.push((false, y));
        }
        y -= LINE_HEIGHT_MM;
    }
    baselines
}

fn builtin_font(doc: &PdfDocumentReference, font: BuiltinFont) -> Result<IndirectFontRef> {
    doc.add_builtin_font(font)
        .map_err(|e| Error::Render(format!("Font setup failed: {:?}", e)))
}

/// Decode an image file; unreadable images degrade to a placeholder
fn load_image(path: &Path) -> Option<DynamicImage> {
    match image::open(path) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Panel image unavailable, using placeholder");
            None
        }
    }
}

/// Scale the image into the panel box, centred, preserving aspect ratio
fn draw_image(layer: &PdfLayerReference, img: DynamicImage, panel_bottom: f32) {
    let rgb = img.to_rgb8();
    let (width_px, height_px) = rgb.dimensions();
    let natural_w = width_px.max(1) as f32 * 25.4 / IMAGE_DPI;
    let natural_h = height_px.max(1) as f32 * 25.4 / IMAGE_DPI;
    let scale = (PANEL_WIDTH_MM / natural_w).min(PANEL_HEIGHT_MM / natural_h);
    let drawn_w = natural_w * scale;
    let drawn_h = natural_h * scale;

    Image::from_dynamic_image(&DynamicImage::ImageRgb8(rgb)).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(MARGIN_MM + (PANEL_WIDTH_MM - drawn_w) / 2.0)),
            translate_y: Some(Mm(panel_bottom + (PANEL_HEIGHT_MM - drawn_h) / 2.0)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );
}

fn draw_placeholder(layer: &PdfLayerReference, panel_bottom: f32) {
    let left = MARGIN_MM;
    let right = MARGIN_MM + PANEL_WIDTH_MM;
    let top = panel_bottom + PANEL_HEIGHT_MM;

    layer.set_outline_thickness(0.5);
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(left), Mm(panel_bottom)), false),
            (Point::new(Mm(right), Mm(panel_bottom)), false),
            (Point::new(Mm(right), Mm(top)), false),
            (Point::new(Mm(left), Mm(top)), false),
        ],
        is_closed: true,
    });
}

/// Greedy word wrap; words longer than a line are split
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
