use glob::{glob_with, MatchOptions, Pattern};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{LabelError, Result};
use crate::types::{ClassList, ProcessingStats, YoloLabel, IMG_FORMATS};
use crate::utils::{create_output_directory, output_file_name, output_stem};

/// Folders written by the fixed-geometry labeler
#[derive(Debug, Clone)]
pub struct PresetOutputDirs {
    pub labels_dir: PathBuf,
    pub image_label_dir: PathBuf,
}

/// Folders written by the model-assisted labeler
#[derive(Debug, Clone)]
pub struct AssistOutputDirs {
    pub dataset_dir: PathBuf,
    pub detections_dir: PathBuf,
    pub no_detections_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub images_dir: PathBuf,
    pub no_detection_labels_dir: PathBuf,
    pub report_dir: PathBuf,
    pub preview_dir: PathBuf,
}

/// Set up `labels/` and, when drawing, `image_label/` under the output folder
pub fn setup_preset_directories(output_dir: &Path, draw: bool) -> Result<PresetOutputDirs> {
    let labels_dir = create_output_directory(&output_dir.join("labels"))?;
    let image_label_dir = output_dir.join("image_label");
    if draw {
        create_output_directory(&image_label_dir)?;
    }
    Ok(PresetOutputDirs {
        labels_dir,
        image_label_dir,
    })
}

/// Set up the `output/`, `report/` and `preview/` trees for the assisted labeler
pub fn setup_assist_directories(output_dir: &Path) -> Result<AssistOutputDirs> {
    let base = output_dir.join("output");
    Ok(AssistOutputDirs {
        dataset_dir: create_output_directory(&base)?,
        detections_dir: create_output_directory(&base.join("detections"))?,
        no_detections_dir: create_output_directory(&base.join("no detections"))?,
        labels_dir: create_output_directory(&base.join("labels"))?,
        images_dir: create_output_directory(&base.join("images"))?,
        no_detection_labels_dir: create_output_directory(&base.join("no detections label"))?,
        report_dir: create_output_directory(&output_dir.join("report"))?,
        // created lazily, only when a preview is actually sampled
        preview_dir: output_dir.join("preview"),
    })
}

/// List image files directly inside `dir`, sorted by file name.
///
/// Extensions are matched case-insensitively; subfolders are not searched.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(LabelError::MissingFolder(dir.to_path_buf()));
    }

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let escaped = Pattern::escape(&dir.to_string_lossy());

    let mut images = Vec::new();
    for ext in IMG_FORMATS {
        let pattern = format!("{}/*.{}", escaped, ext);
        let entries = glob_with(&pattern, options)?;
        images.extend(
            entries
                .filter_map(|entry| entry.ok())
                .filter(|path| path.is_file()),
        );
    }

    images.sort_by_key(|path| output_file_name(path));
    images.dedup();
    Ok(images)
}

/// Path of the label file belonging to `image_path` inside `labels_dir`.
/// Dots inside the stem are kept.
pub fn label_path_for(labels_dir: &Path, image_path: &Path) -> PathBuf {
    labels_dir.join(format!("{}.txt", output_stem(image_path)))
}

/// Write (truncating) a label file with one line per label
pub fn write_label_file(path: &Path, labels: &[YoloLabel]) -> Result<()> {
    let file = File::create(path).map_err(|e| LabelError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for label in labels {
        writeln!(writer, "{}", label).map_err(|e| LabelError::io(path, e))?;
    }
    writer.flush().map_err(|e| LabelError::io(path, e))
}

/// Read a label file, skipping lines that are not valid YOLO labels
pub fn read_label_file(path: &Path) -> Result<Vec<YoloLabel>> {
    let content = fs::read_to_string(path).map_err(|e| LabelError::io(path, e))?;
    let mut labels = Vec::new();
    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        match line.parse::<YoloLabel>() {
            Ok(label) => labels.push(label),
            Err(e) => log::warn!("Invalid label format in {}: {}", path.display(), e),
        }
    }
    Ok(labels)
}

/// Copy an image into `dir`, keeping its file name
pub fn copy_image_into(image_path: &Path, dir: &Path) -> Result<PathBuf> {
    let target = dir.join(output_file_name(image_path));
    fs::copy(image_path, &target).map_err(|e| LabelError::io(&target, e))?;
    Ok(target)
}

/// Report files of the assisted labeler, one image stem per line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    NoDetection,
    MoreThanOne,
    OutOfRange,
    MultipleDetections,
}

impl ReportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ReportKind::NoDetection => "no_detection.txt",
            ReportKind::MoreThanOne => "no_detection_more_than_one.txt",
            ReportKind::OutOfRange => "no_detection_out_of_range.txt",
            ReportKind::MultipleDetections => "more_than_two_detection.txt",
        }
    }
}

/// Append an image stem to a report file in `report_dir`
pub fn append_report(report_dir: &Path, kind: ReportKind, stem: &str) -> Result<()> {
    let path = report_dir.join(kind.file_name());
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| LabelError::io(&path, e))?;
    writeln!(file, "{}", stem).map_err(|e| LabelError::io(&path, e))
}

/// Write the run statistics as pretty JSON
pub fn write_summary(path: &Path, stats: &ProcessingStats) -> Result<()> {
    let file = File::create(path).map_err(|e| LabelError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, stats)?;
    writer.flush().map_err(|e| LabelError::io(path, e))
}

/// Create the dataset.yaml file naming the classes for YOLO training
pub fn create_dataset_yaml(output_dir: &Path, classes: &ClassList) -> Result<()> {
    let dataset_yaml_path = output_dir.join("dataset.yaml");
    let absolute_path =
        fs::canonicalize(output_dir).map_err(|e| LabelError::io(output_dir, e))?;
    let mut yaml_content = format!(
        "path: {}\ntrain: images\nval: images\n\nnames:\n",
        absolute_path.to_string_lossy()
    );
    for (id, name) in classes.names().iter().enumerate() {
        yaml_content.push_str(&format!("    {}: {}\n", id, name));
    }

    let mut dataset_yaml = BufWriter::new(
        File::create(&dataset_yaml_path).map_err(|e| LabelError::io(&dataset_yaml_path, e))?,
    );
    dataset_yaml
        .write_all(yaml_content.as_bytes())
        .map_err(|e| LabelError::io(&dataset_yaml_path, e))
}
