use std::fs;
use std::path::PathBuf;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::warn;

use crate::config::AppConfig;
use crate::inference::Detection;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const STROKE_WIDTH: i32 = 3;
const LABEL_SCALE: f32 = 14.0;

// Fallbacks when LABEL_FONT_PATH is not set.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
];

/// Draws detection boxes and labels onto the converted image. The font is
/// resolved once at startup; without one, rectangles are still drawn and
/// labels are skipped.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn from_config(config: &AppConfig) -> Self {
        let candidates: Vec<PathBuf> = config
            .label_font_path
            .iter()
            .cloned()
            .chain(FONT_CANDIDATES.iter().map(PathBuf::from))
            .collect();
        let font = candidates
            .iter()
            .find_map(|p| fs::read(p).ok())
            .and_then(|bytes| FontVec::try_from_vec(bytes).ok());
        if font.is_none() {
            warn!("no usable label font found; boxes will be drawn without text labels");
        }
        Self { font }
    }

    /// Returns the RGB conversion of `image` with one rectangle and one label
    /// per detection. With no detections the output is pixel-identical to the
    /// plain conversion.
    pub fn annotate(&self, image: &GrayImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = DynamicImage::ImageLuma8(image.clone()).to_rgb8();

        for det in detections {
            let left = (det.x - det.width / 2.0).round() as i32;
            let top = (det.y - det.height / 2.0).round() as i32;
            let right = (det.x + det.width / 2.0).round() as i32;
            let bottom = (det.y + det.height / 2.0).round() as i32;

            // Inclusive corners; the stroke thickens inward so the outer edge
            // sits exactly on the box.
            for inset in 0..STROKE_WIDTH {
                let w = right - left + 1 - 2 * inset;
                let h = bottom - top + 1 - 2 * inset;
                if w <= 0 || h <= 0 {
                    break;
                }
                let rect = Rect::at(left + inset, top + inset).of_size(w as u32, h as u32);
                draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
            }

            if let Some(font) = &self.font {
                let label = format!("{} ({:.2})", det.label, det.confidence);
                // May clip off-canvas for boxes touching the top edge.
                draw_text_mut(
                    &mut canvas,
                    BOX_COLOR,
                    left,
                    top - 10,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &label,
                );
            }
        }

        canvas
    }
}
