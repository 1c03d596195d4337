use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LabelError;

// Image formats picked up from an input folder
pub const IMG_FORMATS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Class names used when none are given on the command line.
pub const DEFAULT_CLASSES: &[&str] = &["Canister", "Foam", "Ring", "Tyvek", "Wafer"];

// Box colours per class id, RGB
const CLASS_COLORS: &[[u8; 3]] = &[
    [255, 255, 0], // canister
    [255, 0, 255], // foam
    [0, 255, 0],   // ring
    [255, 0, 0],   // tyvek
    [0, 0, 255],   // wafer
];

/// A bounding box in YOLO's normalized centre format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    pub const fn new(x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }
}

/// A bounding box in integer pixel corners, ready for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelBox {
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// One line of a YOLO label file: `class_id x_center y_center width height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloLabel {
    pub class_id: usize,
    pub bbox: NormalizedBox,
}

impl YoloLabel {
    pub fn new(class_id: usize, bbox: NormalizedBox) -> Self {
        Self { class_id, bbox }
    }
}

impl fmt::Display for YoloLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id,
            self.bbox.x_center,
            self.bbox.y_center,
            self.bbox.width,
            self.bbox.height
        )
    }
}

impl FromStr for YoloLabel {
    type Err = LabelError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| LabelError::InvalidLabel {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(invalid("expected 5 fields"));
        }

        // Some exporters write the class id as a float ("0.0")
        let class_id = match parts[0].parse::<usize>() {
            Ok(id) => id,
            Err(_) => match parts[0].parse::<f64>() {
                Ok(v) if v >= 0.0 && v.fract() == 0.0 => v as usize,
                _ => return Err(invalid("class id is not a non-negative integer")),
            },
        };

        let mut coords = [0.0f64; 4];
        for (slot, raw) in coords.iter_mut().zip(&parts[1..]) {
            *slot = raw
                .parse::<f64>()
                .map_err(|_| invalid("coordinate is not a number"))?;
        }

        Ok(YoloLabel::new(
            class_id,
            NormalizedBox::new(coords[0], coords[1], coords[2], coords[3]),
        ))
    }
}

/// Ordered list of class names; a class id is the index into this list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassList {
    names: Vec<String>,
}

impl Default for ClassList {
    fn default() -> Self {
        Self::new(DEFAULT_CLASSES.iter().map(|s| s.to_string()).collect())
    }
}

impl ClassList {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Build from command-line input, falling back to the defaults when empty.
    pub fn from_args(names: &[String]) -> Self {
        if names.is_empty() {
            Self::default()
        } else {
            Self::new(names.to_vec())
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    /// First class whose name occurs anywhere in the filename, ignoring case.
    pub fn match_contains(&self, filename: &str) -> Option<usize> {
        let filename = filename.to_lowercase();
        self.names
            .iter()
            .position(|name| filename.contains(&name.to_lowercase()))
    }

    /// First class whose name followed by `_` starts the filename, ignoring
    /// case. Files without such a prefix map to class 0.
    pub fn match_prefix(&self, filename: &str) -> usize {
        let filename = filename.to_lowercase();
        self.names
            .iter()
            .position(|name| filename.starts_with(&format!("{}_", name.to_lowercase())))
            .unwrap_or(0)
    }

    /// Drawing colour of a class, wrapping around the palette.
    pub fn color(class_id: usize) -> [u8; 3] {
        CLASS_COLORS[class_id % CLASS_COLORS.len()]
    }
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub labeled: usize,
    pub drawn: usize,
    pub skipped_no_class: usize,
    pub skipped_unreadable: usize,
    pub no_detection: usize,
    pub multiple_detections: usize,
    pub out_of_range: usize,
    pub boxes_written: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl ProcessingStats {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Default::default()
        }
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total images: {}", self.total_files);
        log::info!("Labeled images: {}", self.labeled);
        if self.drawn > 0 {
            log::info!("Annotated images written: {}", self.drawn);
        }
        if self.boxes_written > 0 {
            log::info!("Boxes written: {}", self.boxes_written);
        }
        if self.no_detection + self.multiple_detections + self.out_of_range > 0 {
            log::info!(
                "Rejected: no detection {}, more than one {}, out of range {}",
                self.no_detection,
                self.multiple_detections,
                self.out_of_range
            );
        }

        let total_skipped = self.skipped_no_class + self.skipped_unreadable;
        if total_skipped > 0 {
            log::warn!(
                "Total skipped images: {} (no matching class: {}, unreadable: {})",
                total_skipped,
                self.skipped_no_class,
                self.skipped_unreadable
            );
        }
        if self.failed > 0 {
            log::error!("Failed writes: {}", self.failed);
        }
        if self.cancelled {
            log::warn!("Run was cancelled before all images were processed");
        }
    }
}
