use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::draw::{draw_labels, save_image, LABEL_COLOR};
use crate::error::{LabelError, Result};
use crate::io::{
    discover_images, label_path_for, read_label_file, setup_preset_directories, write_label_file,
    PresetOutputDirs,
};
use crate::progress::RunState;
use crate::types::{ClassList, NormalizedBox, ProcessingStats, YoloLabel};
use crate::utils::output_file_name;

/// Settings of one fixed-geometry labeling run
#[derive(Debug, Clone)]
pub struct PresetJob {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub bbox: NormalizedBox,
    pub classes: ClassList,
    pub draw: bool,
}

/// Input images and output folders of a run, resolved before it starts
#[derive(Debug, Clone)]
pub struct PresetPlan {
    pub images: Vec<PathBuf>,
    pub dirs: PresetOutputDirs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    Done,
    Skipped,
    Unreadable,
    Failed,
    Cancelled,
}

/// Find the input images and create the output folders.
pub fn plan_preset_run(job: &PresetJob) -> Result<PresetPlan> {
    let images = discover_images(&job.input_dir)?;
    if images.is_empty() {
        return Err(LabelError::NoImages(job.input_dir.clone()));
    }
    let dirs = setup_preset_directories(&job.output_dir, job.draw)?;
    Ok(PresetPlan { images, dirs })
}

/// Label every image whose filename names a class, then draw the labels.
///
/// Each image advances the shared progress once per phase. A cancelled run
/// stops after the files already in flight; nothing is rolled back.
pub fn run_preset_labeling(job: &PresetJob, plan: &PresetPlan, state: &RunState) -> ProcessingStats {
    let phases = if job.draw { 2 } else { 1 };
    state.set_total_steps(plan.images.len() * phases);
    let mut stats = ProcessingStats::new(plan.images.len());

    info!("Phase 1: Generating label files...");
    let outcomes: Vec<StepOutcome> = plan
        .images
        .par_iter()
        .map(|image_path| {
            if state.is_cancelled() {
                return StepOutcome::Cancelled;
            }
            let name = output_file_name(image_path);
            state.advance(&format!("Labeling: {}", name));
            label_image(image_path, &name, job, &plan.dirs.labels_dir)
        })
        .collect();

    for outcome in &outcomes {
        match outcome {
            StepOutcome::Done => stats.labeled += 1,
            StepOutcome::Skipped => stats.skipped_no_class += 1,
            StepOutcome::Failed => stats.failed += 1,
            StepOutcome::Unreadable | StepOutcome::Cancelled => {}
        }
    }

    if state.is_cancelled() {
        stats.cancelled = true;
        return stats;
    }
    if !job.draw {
        return stats;
    }

    info!("Phase 2: Drawing bounding boxes and saving images...");
    let outcomes: Vec<StepOutcome> = plan
        .images
        .par_iter()
        .map(|image_path| {
            if state.is_cancelled() {
                return StepOutcome::Cancelled;
            }
            let name = output_file_name(image_path);
            state.advance(&format!("Drawing: {}", name));
            draw_image(image_path, &name, &plan.dirs)
        })
        .collect();

    for outcome in &outcomes {
        match outcome {
            StepOutcome::Done => stats.drawn += 1,
            StepOutcome::Unreadable => stats.skipped_unreadable += 1,
            StepOutcome::Failed => stats.failed += 1,
            StepOutcome::Skipped | StepOutcome::Cancelled => {}
        }
    }
    stats.cancelled = state.is_cancelled();
    stats
}

fn label_image(image_path: &Path, name: &str, job: &PresetJob, labels_dir: &Path) -> StepOutcome {
    let Some(class_id) = job.classes.match_contains(name) else {
        warn!("No matching class found for {}, skipping.", name);
        return StepOutcome::Skipped;
    };

    let label = YoloLabel::new(class_id, job.bbox);
    let label_path = label_path_for(labels_dir, image_path);
    match write_label_file(&label_path, &[label]) {
        Ok(()) => StepOutcome::Done,
        Err(e) => {
            error!("Failed to write label for {}: {}", name, e);
            StepOutcome::Failed
        }
    }
}

fn draw_image(image_path: &Path, name: &str, dirs: &PresetOutputDirs) -> StepOutcome {
    let label_path = label_path_for(&dirs.labels_dir, image_path);
    if !label_path.exists() {
        return StepOutcome::Skipped;
    }

    let mut img = match image::open(image_path) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            warn!("Failed to read image {}: {}", image_path.display(), e);
            return StepOutcome::Unreadable;
        }
    };
    let labels = match read_label_file(&label_path) {
        Ok(labels) => labels,
        Err(e) => {
            warn!("{}", e);
            return StepOutcome::Skipped;
        }
    };

    draw_labels(&mut img, &labels, LABEL_COLOR);
    match save_image(&img, &dirs.image_label_dir.join(name)) {
        Ok(()) => StepOutcome::Done,
        Err(e) => {
            error!("Failed to save annotated image for {}: {}", name, e);
            StepOutcome::Failed
        }
    }
}
