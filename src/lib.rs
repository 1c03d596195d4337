//! YOLO label preparation for folders of product photographs
//!
//! Two ways of producing labels are provided: a fixed box per image with the
//! class taken from the filename, and boxes found by a YOLO detector exported
//! to ONNX, filtered by size and sorted into labeled and rejected folders.

pub mod assisted_labeling;
pub mod config;
pub mod conversion;
pub mod draw;
pub mod error;
pub mod inference;
pub mod io;
pub mod preset_labeling;
pub mod preview;
pub mod progress;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Args, BoxPreset, Command};
pub use error::{LabelError, Result};
pub use inference::{Detection, Detector, DetectorConfig, OnnxDetector};
pub use types::{ClassList, NormalizedBox, ProcessingStats, YoloLabel};

pub use assisted_labeling::{plan_assist_run, run_assisted_labeling, AssistJob, AssistPlan};
pub use preset_labeling::{plan_preset_run, run_preset_labeling, PresetJob, PresetPlan};
pub use preview::{draw_label_samples, run_preview};
