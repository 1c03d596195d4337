//! Rendering of label boxes and captions onto images.

use ab_glyph::{FontVec, PxScale};
use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::conversion::normalized_to_pixel;
use crate::error::{LabelError, Result};
use crate::types::{NormalizedBox, PixelBox, YoloLabel};

/// Colour used for preset boxes and label verification
pub const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Line thickness of drawn boxes, in pixels
pub const BOX_THICKNESS: i32 = 2;

/// Size of the preview thumbnail
pub const PREVIEW_SIZE: (u32, u32) = (400, 250);

const CAPTION_SCALE: f32 = 16.0;

// Fonts tried when no caption font is configured
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Draw a hollow box, growing outward for each extra pixel of thickness.
/// Both corners are inclusive. Degenerate boxes are ignored; parts outside
/// the image are clipped.
pub fn draw_box(img: &mut RgbImage, bbox: &PixelBox, color: Rgb<u8>, thickness: i32) {
    if bbox.width() <= 0 || bbox.height() <= 0 {
        return;
    }
    for t in 0..thickness.max(1) {
        let rect = Rect::at(bbox.x1 - t, bbox.y1 - t)
            .of_size((bbox.width() + 1 + 2 * t) as u32, (bbox.height() + 1 + 2 * t) as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Draw a caption just above the box's top-left corner.
pub fn draw_caption(img: &mut RgbImage, bbox: &PixelBox, color: Rgb<u8>, font: &FontVec, text: &str) {
    let y = (bbox.y1 - 10 - CAPTION_SCALE as i32).max(0);
    draw_text_mut(img, color, bbox.x1.max(0), y, PxScale::from(CAPTION_SCALE), font, text);
}

/// Draw every label of a label file onto the image in `color`.
pub fn draw_labels(img: &mut RgbImage, labels: &[YoloLabel], color: Rgb<u8>) {
    let (width, height) = img.dimensions();
    for label in labels {
        let px = normalized_to_pixel(&label.bbox, width, height);
        draw_box(img, &px, color, BOX_THICKNESS);
    }
}

/// Image with the given normalized box drawn, shrunk to fit the preview size.
pub fn render_preview(image: &DynamicImage, bbox: &NormalizedBox) -> RgbImage {
    let mut img = image.to_rgb8();
    let (width, height) = img.dimensions();
    let px = normalized_to_pixel(bbox, width, height);
    draw_box(&mut img, &px, LABEL_COLOR, BOX_THICKNESS);
    thumbnail(&img, PREVIEW_SIZE.0, PREVIEW_SIZE.1)
}

/// Shrink an image to fit in `max_w` x `max_h`, keeping the aspect ratio.
/// Images that already fit are returned unchanged.
pub fn thumbnail(img: &RgbImage, max_w: u32, max_h: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width <= max_w && height <= max_h {
        return img.clone();
    }
    let scale = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
    let new_w = ((width as f64 * scale) as u32).max(1);
    let new_h = ((height as f64 * scale) as u32).max(1);
    imageops::resize(img, new_w, new_h, imageops::FilterType::Triangle)
}

/// Load the caption font from `path`, or the first available system font.
pub fn load_font(path: Option<&Path>) -> Result<Option<FontVec>> {
    if let Some(path) = path {
        let data = std::fs::read(path).map_err(|e| LabelError::io(path, e))?;
        let font =
            FontVec::try_from_vec(data).map_err(|_| LabelError::Font(path.to_path_buf()))?;
        return Ok(Some(font));
    }

    for candidate in SYSTEM_FONT_PATHS {
        if let Ok(data) = std::fs::read(candidate) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                log::debug!("Loaded system font: {}", candidate);
                return Ok(Some(font));
            }
        }
    }
    log::warn!("No caption font found; boxes will be drawn without class names");
    Ok(None)
}

/// Save an image, creating the parent folder if needed.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LabelError::io(parent, e))?;
    }
    img.save(path).map_err(|e| LabelError::image(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_box_paints_the_outline_only() {
        let mut img = RgbImage::new(20, 20);
        let bbox = PixelBox {
            x1: 5,
            y1: 5,
            x2: 15,
            y2: 15,
        };
        draw_box(&mut img, &bbox, LABEL_COLOR, 2);
        assert_eq!(*img.get_pixel(5, 5), LABEL_COLOR);
        // second ring sits one pixel outside the first
        assert_eq!(*img.get_pixel(4, 4), LABEL_COLOR);
        assert_eq!(*img.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn draw_box_includes_far_corner() {
        let mut img = RgbImage::new(20, 20);
        let bbox = PixelBox {
            x1: 5,
            y1: 5,
            x2: 12,
            y2: 12,
        };
        draw_box(&mut img, &bbox, LABEL_COLOR, 1);
        assert_eq!(*img.get_pixel(12, 12), LABEL_COLOR);
        assert_eq!(*img.get_pixel(12, 8), LABEL_COLOR);
        assert_eq!(*img.get_pixel(13, 13), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(11, 11), Rgb([0, 0, 0]));
    }

    #[test]
    fn draw_box_clips_and_ignores_degenerate_boxes() {
        let mut img = RgbImage::new(10, 10);
        let outside = PixelBox {
            x1: -5,
            y1: -5,
            x2: 30,
            y2: 30,
        };
        draw_box(&mut img, &outside, LABEL_COLOR, 2);
        let empty = PixelBox {
            x1: 3,
            y1: 3,
            x2: 3,
            y2: 8,
        };
        draw_box(&mut img, &empty, LABEL_COLOR, 2);
        assert_eq!(*img.get_pixel(3, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn thumbnail_fits_preview_and_keeps_aspect() {
        let img = RgbImage::new(800, 400);
        let thumb = thumbnail(&img, 400, 250);
        assert_eq!(thumb.dimensions(), (400, 200));

        let small = RgbImage::new(100, 50);
        assert_eq!(thumbnail(&small, 400, 250).dimensions(), (100, 50));
    }

    #[test]
    fn render_preview_draws_preset_box() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(200, 100));
        let preview = render_preview(&image, &NormalizedBox::new(0.5, 0.5, 0.5, 0.5));
        assert_eq!(preview.dimensions(), (200, 100));
        // box spans x 50..150, y 25..75
        assert_eq!(*preview.get_pixel(50, 50), LABEL_COLOR);
        assert_eq!(*preview.get_pixel(100, 50), Rgb([0, 0, 0]));
    }
}
