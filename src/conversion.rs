use crate::types::{NormalizedBox, PixelBox};

/// Inclusive width/height ranges a detection must fall into, in normalized units.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeFilter {
    pub width_ranges: Vec<(f64, f64)>,
    pub height_ranges: Vec<(f64, f64)>,
}

impl Default for SizeFilter {
    // One range per carrier size (6 inch, 8 inch)
    fn default() -> Self {
        Self {
            width_ranges: vec![(0.35, 0.45), (0.49, 0.59)],
            height_ranges: vec![(0.57, 0.73), (0.77, 0.93)],
        }
    }
}

impl SizeFilter {
    /// Width and height must each land in one of their ranges; the ranges are
    /// checked independently of each other.
    pub fn accepts(&self, width: f64, height: f64) -> bool {
        let in_any = |value: f64, ranges: &[(f64, f64)]| {
            ranges
                .iter()
                .any(|&(lower, upper)| lower <= value && value <= upper)
        };
        in_any(width, &self.width_ranges) && in_any(height, &self.height_ranges)
    }
}

/// Convert a normalized centre box to pixel corners, truncating toward zero.
pub fn normalized_to_pixel(bbox: &NormalizedBox, image_width: u32, image_height: u32) -> PixelBox {
    let x_c = bbox.x_center * image_width as f64;
    let y_c = bbox.y_center * image_height as f64;
    let w = bbox.width * image_width as f64;
    let h = bbox.height * image_height as f64;

    PixelBox {
        x1: (x_c - w / 2.0) as i32,
        y1: (y_c - h / 2.0) as i32,
        x2: (x_c + w / 2.0) as i32,
        y2: (y_c + h / 2.0) as i32,
    }
}

/// Convert a pixel centre box (as produced by the detector) to drawing corners.
///
/// The start corner is the rounded centre minus half the size floored; the end
/// corner adds the unrounded size back to it.
pub fn center_to_pixel(x_center: f32, y_center: f32, width: f32, height: f32) -> PixelBox {
    let x1 = x_center.round() as i32 - (width / 2.0).floor() as i32;
    let y1 = y_center.round() as i32 - (height / 2.0).floor() as i32;
    PixelBox {
        x1,
        y1,
        x2: (x1 as f32 + width).round() as i32,
        y2: (y1 as f32 + height).round() as i32,
    }
}

/// Normalize a pixel centre box by the image size.
pub fn pixel_to_normalized(
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
    image_width: u32,
    image_height: u32,
) -> NormalizedBox {
    let iw = image_width as f64;
    let ih = image_height as f64;
    NormalizedBox::new(
        x_center as f64 / iw,
        y_center as f64 / ih,
        width as f64 / iw,
        height as f64 / ih,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_to_pixel_truncates() {
        let bbox = NormalizedBox::new(0.5, 0.5, 0.25, 0.5);
        let px = normalized_to_pixel(&bbox, 100, 60);
        // x_c 50, w 25 -> 37.5..62.5 ; y_c 30, h 30 -> 15..45
        assert_eq!(
            px,
            PixelBox {
                x1: 37,
                y1: 15,
                x2: 62,
                y2: 45
            }
        );
    }

    #[test]
    fn normalized_to_pixel_six_inch_preset() {
        let bbox = NormalizedBox::new(
            0.49954802858976477,
            0.5574033282796372,
            0.43050458369337075,
            0.6787368486225077,
        );
        let px = normalized_to_pixel(&bbox, 640, 480);
        assert_eq!(px.x1, 181);
        assert_eq!(px.x2, 457);
        assert_eq!(px.y1, 104);
        assert_eq!(px.y2, 430);
    }

    #[test]
    fn center_to_pixel_matches_detector_convention() {
        let px = center_to_pixel(100.4, 50.6, 41.0, 20.0);
        // round(100.4)=100, floor(20.5)=20 -> 80 ; round(50.6)=51, 10 -> 41
        assert_eq!(px.x1, 80);
        assert_eq!(px.y1, 41);
        assert_eq!(px.x2, 121);
        assert_eq!(px.y2, 61);
    }

    #[test]
    fn pixel_to_normalized_divides_by_image_size() {
        let bbox = pixel_to_normalized(320.0, 240.0, 160.0, 120.0, 640, 480);
        assert_eq!(bbox, NormalizedBox::new(0.5, 0.5, 0.25, 0.25));
    }

    #[test]
    fn size_filter_bounds_are_inclusive() {
        let filter = SizeFilter::default();
        assert!(filter.accepts(0.35, 0.57));
        assert!(filter.accepts(0.45, 0.73));
        assert!(filter.accepts(0.59, 0.93));
        assert!(filter.accepts(0.40, 0.85));
    }

    #[test]
    fn size_filter_rejects_gaps_and_extremes() {
        let filter = SizeFilter::default();
        // width in the gap between the two ranges
        assert!(!filter.accepts(0.47, 0.6));
        // height in the gap
        assert!(!filter.accepts(0.4, 0.75));
        assert!(!filter.accepts(0.1, 0.1));
        assert!(!filter.accepts(0.9, 0.9));
    }
}
