//! PDF report rendering
//!
//! Letter-size report for one analysis: analysis information, the original
//! and annotated images side by side, severity assessment, detected objects,
//! tags and summary. Content that does not fit continues on a new page.
//!
//! Images are embedded as uncompressed RGB8 XObjects built from `image`
//! buffers, so printpdf's own image support is not needed.

use std::path::Path;

use ihub_common::{AnalysisResult, Error, Result, Severity};
use image::{imageops::FilterType, RgbImage};
use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject,
    IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Px, Rgb,
};
use tracing::warn;

use crate::store::StoredAnalysis;

const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN_X: f32 = 19.05;
const MARGIN_TOP: f32 = 19.05;
const MARGIN_BOTTOM: f32 = 12.7;
const PT_TO_MM: f32 = 0.3528;
const LINE_SPACING: f32 = 1.4;

const TITLE: &str = "InsightHub Detection Report";

const TEXT: (u8, u8, u8) = (0x1f, 0x29, 0x37);
const HEADING: (u8, u8, u8) = (0x25, 0x63, 0xeb);
const MUTED: (u8, u8, u8) = (0x4b, 0x55, 0x63);

/// Detection table column offsets from the left margin, in mm
const COLUMNS: [f32; 4] = [0.0, 10.0, 62.0, 95.0];

const IMAGE_GAP: f32 = 6.0;
const IMAGE_MAX_HEIGHT: f32 = 90.0;
/// Longest side of an embedded image, in pixels
const IMAGE_MAX_PIXELS: u32 = 800;

/// One picture of the "Detection Results" section
pub struct ReportImage {
    pub caption: &'static str,
    /// `None` when the stored file is missing or unreadable
    pub pixels: Option<RgbImage>,
}

fn severity_color(severity: Severity) -> (u8, u8, u8) {
    match severity {
        Severity::Critical => (0xdc, 0x26, 0x26),
        Severity::High => (0xea, 0x58, 0x0c),
        Severity::Medium => (0xca, 0x8a, 0x04),
        Severity::Low => (0x16, 0xa3, 0x4a),
    }
}

/// Render the report for a stored analysis, embedding both of its images
pub fn render_report(stored: &StoredAnalysis) -> Result<Vec<u8>> {
    let images = [
        ReportImage {
            caption: "Original Image",
            pixels: load_image(&stored.original_path),
        },
        ReportImage {
            caption: "Annotated Image",
            pixels: load_image(&stored.annotated_path),
        },
    ];
    render(&stored.result, &images)
}

fn load_image(path: &Path) -> Option<RgbImage> {
    match image::open(path) {
        Ok(img) => {
            let img = if img.width().max(img.height()) > IMAGE_MAX_PIXELS {
                img.resize(IMAGE_MAX_PIXELS, IMAGE_MAX_PIXELS, FilterType::Triangle)
            } else {
                img
            };
            Some(img.to_rgb8())
        }
        Err(e) => {
            warn!("Report image {} unavailable: {}", path.display(), e);
            None
        }
    }
}

/// Render `result` as PDF bytes with the given images
pub fn render(result: &AnalysisResult, images: &[ReportImage]) -> Result<Vec<u8>> {
    let mut writer = ReportWriter::new(TITLE)?;

    writer.title(TITLE);
    writer.section("Analysis Information");
    for (key, value) in metadata_rows(result) {
        writer.key_value(&key, &value);
    }

    if !images.is_empty() {
        writer.section("Detection Results");
        writer.image_row(images);
    }

    writer.section("Severity Assessment");
    writer.key_value_colored(
        "Level:",
        result.severity.as_str(),
        severity_color(result.severity),
    );
    writer.paragraph(&format!("Reason: {}", result.severity_reason), 10.0);

    writer.section("Detected Objects");
    writer.table_row(&["#", "Object", "Confidence", "Bounding Box"], true);
    for (idx, det) in result.detections.iter().enumerate() {
        let bbox = det.bbox();
        writer.table_row(
            &[
                &(idx + 1).to_string(),
                &title_case(det.label()),
                &percent(det.confidence()),
                &format!(
                    "[{:.0}, {:.0}, {:.0}, {:.0}]",
                    bbox.x1, bbox.y1, bbox.x2, bbox.y2
                ),
            ],
            false,
        );
    }

    if !result.tags.is_empty() {
        writer.section("Auto-Generated Tags");
        let tags: Vec<String> = result.tags.iter().map(|t| format!("#{}", t)).collect();
        writer.paragraph_colored(&tags.join(" "), 10.0, HEADING);
    }

    writer.section("Summary");
    writer.paragraph(&result.summary, 10.0);

    writer.finish()
}

/// Rows of the "Analysis Information" block
fn metadata_rows(result: &AnalysisResult) -> Vec<(String, String)> {
    let mut rows = vec![
        ("Analysis ID:".to_string(), result.analysis_id.to_string()),
        (
            "Generated:".to_string(),
            result
                .timestamp
                .format("%B %d, %Y at %I:%M %p")
                .to_string(),
        ),
        (
            "Total Detections:".to_string(),
            result.detections.len().to_string(),
        ),
        ("Average Confidence:".to_string(), percent(result.score)),
    ];

    if let Some(location) = result.location() {
        rows.push(("Location:".to_string(), format_location(location.latitude, location.longitude)));
    }
    rows
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// `37.7749 N, 122.4194 W`
pub fn format_location(latitude: f64, longitude: f64) -> String {
    format!(
        "{:.4} {}, {:.4} {}",
        latitude.abs(),
        if latitude >= 0.0 { "N" } else { "S" },
        longitude.abs(),
        if longitude >= 0.0 { "E" } else { "W" }
    )
}

/// `safety_shoe` → `Safety Shoe`
pub fn title_case(label: &str) -> String {
    label
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Greedy word wrap at `max_chars` per line
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Built-in PDF fonts only cover Latin-1
fn ascii(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

fn line_height(size_pt: f32) -> f32 {
    size_pt * PT_TO_MM * LINE_SPACING
}

struct ReportWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Baseline of the next line, mm from the page bottom
    cursor: f32,
}

impl ReportWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| Error::Internal(format!("PDF font error: {:?}", e)))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| Error::Internal(format!("PDF font error: {:?}", e)))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            cursor: PAGE_HEIGHT - MARGIN_TOP,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height < MARGIN_BOTTOM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.cursor = PAGE_HEIGHT - MARGIN_TOP;
        }
    }

    fn write_at(&self, text: &str, size: f32, x: f32, bold: bool, color: (u8, u8, u8)) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.set_fill_color(rgb(color));
        self.layer
            .use_text(ascii(text), size, Mm(MARGIN_X + x), Mm(self.cursor), font);
    }

    fn line(&mut self, text: &str, size: f32, x: f32, bold: bool, color: (u8, u8, u8)) {
        let height = line_height(size);
        self.ensure_space(height);
        self.cursor -= height;
        self.write_at(text, size, x, bold, color);
    }

    fn title(&mut self, text: &str) {
        self.line(text, 24.0, 0.0, true, (0x1a, 0x1a, 0x1a));
        self.cursor -= 5.0;
    }

    fn section(&mut self, text: &str) {
        self.cursor -= 4.0;
        self.line(text, 14.0, 0.0, true, HEADING);
        self.cursor -= 1.5;
    }

    fn key_value(&mut self, key: &str, value: &str) {
        self.key_value_colored(key, value, TEXT);
    }

    fn key_value_colored(&mut self, key: &str, value: &str, color: (u8, u8, u8)) {
        self.line(key, 10.0, 0.0, true, TEXT);
        self.write_at(value, 10.0, 40.0, false, color);
    }

    fn paragraph(&mut self, text: &str, size: f32) {
        self.paragraph_colored(text, size, TEXT);
    }

    fn paragraph_colored(&mut self, text: &str, size: f32, color: (u8, u8, u8)) {
        let usable_pt = (PAGE_WIDTH - 2.0 * MARGIN_X) / PT_TO_MM;
        let max_chars = (usable_pt / (size * 0.5)).max(10.0) as usize;
        for line in wrap(text, max_chars) {
            self.line(&line, size, 0.0, false, color);
        }
    }

    fn table_row(&mut self, cells: &[&str; 4], header: bool) {
        let color = if header { HEADING } else { TEXT };
        let height = line_height(10.0);
        self.ensure_space(height);
        self.cursor -= height;
        for (cell, x) in cells.iter().zip(COLUMNS) {
            self.write_at(cell, 10.0, x, header, color);
        }
    }

    /// Images side by side at equal width, captions underneath
    fn image_row(&mut self, images: &[ReportImage]) {
        let count = images.len() as f32;
        let usable = PAGE_WIDTH - 2.0 * MARGIN_X;
        let slot_w = (usable - IMAGE_GAP * (count - 1.0)) / count;

        // Each image keeps its aspect ratio; the row is as tall as the tallest
        let sizes: Vec<Option<(f32, f32)>> = images
            .iter()
            .map(|img| {
                img.pixels.as_ref().map(|px| {
                    let aspect = px.height() as f32 / px.width().max(1) as f32;
                    let w = slot_w.min(IMAGE_MAX_HEIGHT / aspect);
                    (w, w * aspect)
                })
            })
            .collect();
        let row_h = sizes
            .iter()
            .flatten()
            .map(|(_, h)| *h)
            .fold(line_height(10.0), f32::max);

        let caption_h = line_height(9.0);
        self.ensure_space(row_h + caption_h + 2.0);
        let top = self.cursor;

        for (idx, (img, size)) in images.iter().zip(&sizes).enumerate() {
            let x = idx as f32 * (slot_w + IMAGE_GAP);
            match (&img.pixels, size) {
                (Some(pixels), Some((w, h))) => self.place_image(pixels, x, top - h, *w),
                _ => {
                    self.cursor = top - line_height(10.0);
                    self.write_at("Image unavailable", 10.0, x, false, MUTED);
                }
            }
            self.cursor = top - row_h - caption_h;
            self.write_at(img.caption, 9.0, x, true, MUTED);
        }
        self.cursor = top - row_h - caption_h - 2.0;
    }

    /// Embed raw RGB8 pixels with the bottom-left corner at (`x`, `y`) mm
    fn place_image(&self, pixels: &RgbImage, x: f32, y: f32, width_mm: f32) {
        let xobject = ImageXObject {
            width: Px(pixels.width() as usize),
            height: Px(pixels.height() as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: pixels.as_raw().clone(),
            image_filter: None,
            smask: None,
            clipping_bbox: None,
        };
        // Pixels per inch that makes the image exactly `width_mm` wide
        let dpi = pixels.width() as f32 * 25.4 / width_mm;

        Image::from(xobject).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN_X + x)),
                translate_y: Some(Mm(y)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| Error::Internal(format!("PDF save failed: {:?}", e)))
    }
}
