//! Object detection with YOLO models exported to ONNX.
//!
//! The pipelines only depend on the [`Detector`] trait; [`OnnxDetector`] is the
//! ONNX Runtime implementation used from the command line.

use image::{imageops, DynamicImage, Rgb, RgbImage};
use ndarray::Array4;
use ort::session::{Session, SessionInputs};
use ort::value::TensorRef;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::path::Path;

use crate::error::{LabelError, Result};

// Ultralytics pads letterboxed inputs with this grey
const PAD_VALUE: u8 = 114;

/// A detected object in pixel coordinates of the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    fn corners(&self) -> (f32, f32, f32, f32) {
        (
            self.x_center - self.width / 2.0,
            self.y_center - self.height / 2.0,
            self.x_center + self.width / 2.0,
            self.y_center + self.height / 2.0,
        )
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersection(&self, other: &Detection) -> f32 {
        let (ax1, ay1, ax2, ay2) = self.corners();
        let (bx1, by1, bx2, by2) = other.corners();
        let w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        w * h
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Anything that can find objects in an image.
pub trait Detector {
    /// Detections sorted by confidence, highest first.
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

/// Detection thresholds and model input geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    pub input_size: u32,
    pub confidence: f32,
    pub iou: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence: 0.5,
            iou: 0.7,
        }
    }
}

/// How an image was scaled and padded into the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn new(image_width: u32, image_height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / image_width as f32)
            .min(input_size as f32 / image_height as f32);
        let new_w = (image_width as f32 * scale).round();
        let new_h = (image_height as f32 * scale).round();
        Self {
            scale,
            // ultralytics rounds the half padding with a 0.1 bias
            pad_x: ((input_size as f32 - new_w) / 2.0 - 0.1).round(),
            pad_y: ((input_size as f32 - new_h) / 2.0 - 0.1).round(),
        }
    }

    /// Map a centre box from model input space back to the original image.
    pub fn restore(&self, x: f32, y: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
        (
            (x - self.pad_x) / self.scale,
            (y - self.pad_y) / self.scale,
            w / self.scale,
            h / self.scale,
        )
    }
}

/// Resize with preserved aspect ratio, centre on a grey square and convert to
/// a `1x3xSxS` RGB tensor scaled to 0..1.
pub fn preprocess(image: &DynamicImage, input_size: u32) -> (Array4<f32>, Letterbox) {
    let letterbox = Letterbox::new(image.width(), image.height(), input_size);
    let new_w = ((image.width() as f32 * letterbox.scale).round() as u32).clamp(1, input_size);
    let new_h = ((image.height() as f32 * letterbox.scale).round() as u32).clamp(1, input_size);

    let resized = imageops::resize(
        &image.to_rgb8(),
        new_w,
        new_h,
        imageops::FilterType::Triangle,
    );
    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([PAD_VALUE; 3]));
    imageops::overlay(
        &mut canvas,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );

    let size = input_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    (tensor, letterbox)
}

/// Decode a YOLOv8 style output of shape `[1, 4 + nc, N]` (or the transposed
/// `[1, N, 4 + nc]`) into detections above the confidence threshold.
///
/// Boxes are centre-xywh in model input pixels followed by one score per class.
pub fn decode_predictions(
    data: &[f32],
    shape: &[usize],
    confidence: f32,
    letterbox: &Letterbox,
) -> Result<Vec<Detection>> {
    let (rows, cols) = match shape {
        [1, a, b] => (*a, *b),
        [a, b] => (*a, *b),
        _ => {
            return Err(LabelError::Inference(format!(
                "unexpected output shape {:?}",
                shape
            )))
        }
    };
    if data.len() != rows * cols {
        return Err(LabelError::Inference(format!(
            "output has {} values, shape {:?} needs {}",
            data.len(),
            shape,
            rows * cols
        )));
    }

    // Attributes run along the shorter axis: 4 box values plus the class scores
    let (num_attrs, num_preds, attrs_first) = if rows <= cols {
        (rows, cols, true)
    } else {
        (cols, rows, false)
    };
    if num_attrs < 5 {
        return Err(LabelError::Inference(format!(
            "output shape {:?} has no class scores",
            shape
        )));
    }
    let value = |pred: usize, attr: usize| {
        if attrs_first {
            data[attr * num_preds + pred]
        } else {
            data[pred * num_attrs + attr]
        }
    };

    let mut detections = Vec::new();
    for pred in 0..num_preds {
        let (class_id, score) = (4..num_attrs)
            .map(|attr| (attr - 4, value(pred, attr)))
            .fold((0, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if score <= confidence {
            continue;
        }
        let (x, y, w, h) = letterbox.restore(
            value(pred, 0),
            value(pred, 1),
            value(pred, 2),
            value(pred, 3),
        );
        detections.push(Detection {
            x_center: x,
            y_center: y,
            width: w,
            height: h,
            confidence: score,
            class_id,
        });
    }
    Ok(detections)
}

/// Per-class non-maximum suppression. The result is sorted by confidence.
pub fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// YOLO detector running on ONNX Runtime.
pub struct OnnxDetector {
    session: Session,
    input_name: String,
    output_name: String,
    config: DetectorConfig,
}

impl std::fmt::Debug for OnnxDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxDetector")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("config", &self.config)
            .finish()
    }
}

impl OnnxDetector {
    /// Load a model from disk.
    pub fn load(model_path: &Path, config: DetectorConfig) -> Result<Self> {
        let open = || -> std::result::Result<Session, ort::Error> {
            Ok(Session::builder()?.commit_from_file(model_path)?)
        };
        let session = open().map_err(|source| LabelError::ModelLoad {
            path: model_path.to_path_buf(),
            source,
        })?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| LabelError::Inference("model declares no inputs".to_string()))?;
        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or_else(|| LabelError::Inference("model declares no outputs".to_string()))?;

        log::info!(
            "Loaded model {} (input {}, output {})",
            model_path.display(),
            input_name,
            output_name
        );
        Ok(Self {
            session,
            input_name,
            output_name,
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl Detector for OnnxDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let (tensor, letterbox) = preprocess(image, self.config.input_size);
        let dims: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let data = tensor
            .as_slice()
            .ok_or_else(|| LabelError::Inference("input tensor is not contiguous".to_string()))?;
        let input = TensorRef::from_array_view((dims, data))?;

        let inputs: SessionInputs<'_, '_, 0> =
            SessionInputs::ValueMap(vec![(Cow::Borrowed(self.input_name.as_str()), input.into())]);
        let outputs = self.session.run(inputs)?;

        let (shape, values) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        let candidates = decode_predictions(values, &shape, self.config.confidence, &letterbox)?;
        Ok(non_maximum_suppression(candidates, self.config.iou))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, w: f32, h: f32, confidence: f32, class_id: usize) -> Detection {
        Detection {
            x_center: x,
            y_center: y,
            width: w,
            height: h,
            confidence,
            class_id,
        }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = det(10.0, 10.0, 10.0, 10.0, 0.9, 0);
        let b = det(100.0, 100.0, 10.0, 10.0, 0.9, 0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn nms_keeps_best_per_class() {
        let detections = vec![
            det(50.0, 50.0, 20.0, 20.0, 0.6, 0),
            det(51.0, 51.0, 20.0, 20.0, 0.9, 0),
            // same place, other class: kept
            det(50.0, 50.0, 20.0, 20.0, 0.7, 1),
            det(200.0, 200.0, 20.0, 20.0, 0.55, 0),
        ];
        let kept = non_maximum_suppression(detections, 0.45);
        let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7, 0.55]);
    }

    #[test]
    fn letterbox_centres_wide_images() {
        let lb = Letterbox::new(1280, 640, 640);
        assert_eq!(lb.scale, 0.5);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 160.0);
        assert_eq!(lb.restore(320.0, 320.0, 100.0, 50.0), (640.0, 320.0, 200.0, 100.0));
    }

    #[test]
    fn letterbox_rounds_odd_padding_down() {
        // 323 spare rows: 161 on top, 162 below
        let lb = Letterbox::new(640, 317, 640);
        assert_eq!(lb.scale, 1.0);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 161.0);
    }

    #[test]
    fn scores_equal_to_threshold_are_dropped() {
        // [1, 5, 6]: one class, first prediction scores exactly the threshold
        let num_preds = 6;
        let mut data = vec![0.0f32; 5 * num_preds];
        let rows: [[f32; 5]; 2] = [[10.0, 10.0, 4.0, 4.0, 0.5], [20.0, 20.0, 4.0, 4.0, 0.51]];
        for (pred, row) in rows.iter().enumerate() {
            for (attr, value) in row.iter().enumerate() {
                data[attr * num_preds + pred] = *value;
            }
        }
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let detections = decode_predictions(&data, &[1, 5, num_preds], 0.5, &lb).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].x_center, 20.0);
    }

    #[test]
    fn default_thresholds() {
        let config = DetectorConfig::default();
        assert_eq!(config.confidence, 0.5);
        assert_eq!(config.iou, 0.7);
        assert_eq!(config.input_size, 640);
    }

    #[test]
    fn preprocess_produces_padded_tensor() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 0, 0])));
        let (tensor, lb) = preprocess(&image, 32);
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        assert_eq!(lb.pad_y, 8.0);
        // padding row is grey, image row is red
        assert!((tensor[[0, 0, 0, 0]] - PAD_VALUE as f32 / 255.0).abs() < 1e-6);
        assert!((tensor[[0, 0, 16, 16]] - 1.0).abs() < 1e-2);
        assert!(tensor[[0, 1, 16, 16]].abs() < 1e-2);
    }

    #[test]
    fn decode_attribute_major_output() {
        // 8 predictions, 4 box attrs + 2 classes, laid out [1, 6, 8]
        let num_preds = 8;
        let mut data = vec![0.0f32; 6 * num_preds];
        let rows: [[f32; 6]; 2] = [
            [100.0, 100.0, 50.0, 40.0, 0.2, 0.8],
            [300.0, 300.0, 60.0, 70.0, 0.1, 0.3],
        ];
        for (pred, row) in rows.iter().enumerate() {
            for (attr, value) in row.iter().enumerate() {
                data[attr * num_preds + pred] = *value;
            }
        }
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let detections = decode_predictions(&data, &[1, 6, num_preds], 0.5, &lb).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 1);
        assert_eq!(detections[0].x_center, 100.0);
        assert_eq!(detections[0].width, 50.0);
    }

    #[test]
    fn decode_prediction_major_output_and_bad_shapes() {
        // [1, 6, 5]: one class, 6 predictions laid out row by row
        let mut data = vec![10.0, 20.0, 4.0, 6.0, 0.9];
        for _ in 0..5 {
            data.extend_from_slice(&[30.0, 40.0, 8.0, 8.0, 0.1]);
        }
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let detections = decode_predictions(&data, &[1, 6, 5], 0.5, &lb).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].x_center, 5.0);
        assert_eq!(detections[0].height, 3.0);

        assert!(decode_predictions(&data, &[1, 1, 6, 5], 0.5, &lb).is_err());
        assert!(decode_predictions(&data, &[1, 7, 5], 0.5, &lb).is_err());
        assert!(decode_predictions(&data[..24], &[1, 6, 4], 0.5, &lb).is_err());
    }
}
