//! Detection box rendering
//!
//! Draws each detection's bounding box onto a copy of the uploaded image,
//! with a filled tab carrying `"<label> <confidence>"` above the box. The
//! bundled DejaVu Sans is used unless `annotation.font_path` names another TTF.

use std::io::Cursor;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use ihub_common::config::AnnotationConfig;
use ihub_common::{Detection, Error, Result};
use tracing::{info, warn};

/// Default label font (DejaVu Sans, see assets/DejaVuSans-LICENSE.txt)
const DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

const LABEL_PADDING: i32 = 3;
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

pub struct Annotator {
    color: Rgb<u8>,
    thickness: u32,
    font: Option<FontVec>,
    scale: PxScale,
}

impl Default for Annotator {
    fn default() -> Self {
        let config = AnnotationConfig::default();
        Self {
            color: Rgb(config.box_color),
            thickness: config.line_thickness,
            font: default_font(),
            scale: PxScale::from(config.font_size),
        }
    }
}

fn default_font() -> Option<FontVec> {
    match FontVec::try_from_vec(DEFAULT_FONT.to_vec()) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Bundled label font unusable, boxes will be drawn without text: {}", e);
            None
        }
    }
}

impl Annotator {
    /// Build from configuration, loading `font_path` in place of the bundled font
    pub fn from_config(config: &AnnotationConfig) -> Result<Self> {
        let font = match &config.font_path {
            Some(path) => {
                let data = std::fs::read(path)?;
                let font = FontVec::try_from_vec(data).map_err(|e| {
                    Error::Config(format!("Invalid font {}: {}", path.display(), e))
                })?;
                info!("Loaded annotation font from {}", path.display());
                Some(font)
            }
            None => default_font(),
        };

        Ok(Self {
            color: Rgb(config.box_color),
            thickness: config.line_thickness.max(1),
            font,
            scale: PxScale::from(config.font_size),
        })
    }

    /// Draw all detections onto an RGB copy of `image`
    pub fn annotate(&self, image: &DynamicImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.to_rgb8();
        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }
        canvas
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        let Some((x1, y1, x2, y2)) = clamp_box(canvas, detection) else {
            return;
        };

        for t in 0..self.thickness as i32 {
            let (w, h) = (x2 - x1 - 2 * t, y2 - y1 - 2 * t);
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, self.color);
        }

        if let Some(font) = &self.font {
            let text = format!("{} {:.2}", detection.label(), detection.confidence());
            let (text_w, text_h) = text_size(self.scale, font, &text);
            let tab_w = text_w as i32 + 2 * LABEL_PADDING;
            let tab_h = text_h as i32 + 2 * LABEL_PADDING;
            // Above the box, or inside it when there is no room
            let tab_y = if y1 - tab_h >= 0 { y1 - tab_h } else { y1 };

            draw_filled_rect_mut(
                canvas,
                Rect::at(x1, tab_y).of_size(tab_w.max(1) as u32, tab_h.max(1) as u32),
                self.color,
            );
            draw_text_mut(
                canvas,
                TEXT_COLOR,
                x1 + LABEL_PADDING,
                tab_y + LABEL_PADDING,
                self.scale,
                font,
                &text,
            );
        }
    }
}

/// Pixel box clamped to the canvas, `None` when nothing remains
fn clamp_box(canvas: &RgbImage, detection: &Detection) -> Option<(i32, i32, i32, i32)> {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    if w == 0 || h == 0 {
        return None;
    }
    let bbox = detection.bbox();
    let x1 = (bbox.x1.floor() as i32).clamp(0, w - 1);
    let y1 = (bbox.y1.floor() as i32).clamp(0, h - 1);
    let x2 = (bbox.x2.ceil() as i32).clamp(0, w);
    let y2 = (bbox.y2.ceil() as i32).clamp(0, h);

    if x1 >= x2 || y1 >= y2 {
        return None;
    }
    Some((x1, y1, x2, y2))
}

/// Encode an annotated image as JPEG
pub fn encode_jpeg(image: RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .map_err(|e| Error::Internal(format!("JPEG encoding failed: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
    }

    #[test]
    fn test_box_edges_are_drawn() {
        let det = Detection::new("car", 0.9, [10.0, 40.0, 60.0, 60.0]).unwrap();
        let out = Annotator::default().annotate(&blank(100, 80), &[det]);

        assert_eq!(*out.get_pixel(10, 40), Rgb([0, 255, 0]));
        assert_eq!(*out.get_pixel(11, 50), Rgb([0, 255, 0]));
        // Interior untouched
        assert_eq!(*out.get_pixel(35, 50), Rgb([255, 255, 255]));
        // Label tab sits directly above the box
        assert_ne!(*out.get_pixel(12, 37), Rgb([255, 255, 255]));
        // Text darkens some tab pixels
        assert!((0..40)
            .flat_map(|y| (10..60).map(move |x| (x, y)))
            .map(|(x, y)| *out.get_pixel(x, y))
            .any(|p| p != Rgb([0, 255, 0]) && p != Rgb([255, 255, 255])));
    }

    #[test]
    fn test_bundled_font_loads() {
        assert!(Annotator::default().font.is_some());
        assert!(Annotator::from_config(&AnnotationConfig::default())
            .unwrap()
            .font
            .is_some());
    }

    #[test]
    fn test_out_of_bounds_box_is_clamped() {
        let det = Detection::new("truck", 0.5, [-20.0, -20.0, 500.0, 500.0]).unwrap();
        let out = Annotator::default().annotate(&blank(40, 30), &[det]);
        assert_eq!(out.dimensions(), (40, 30));
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 255, 0]));
        assert_eq!(*out.get_pixel(39, 29), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_degenerate_box_is_skipped() {
        let det = Detection::new("crack", 0.5, [30.0, 30.0, 10.0, 10.0]).unwrap();
        let out = Annotator::default().annotate(&blank(40, 40), &[det]);
        assert!(out.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_encode_jpeg() {
        let bytes = encode_jpeg(RgbImage::new(8, 8)).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_missing_font_is_error() {
        let config = AnnotationConfig {
            font_path: Some("/nonexistent/font.ttf".into()),
            ..Default::default()
        };
        assert!(Annotator::from_config(&config).is_err());
    }
}
