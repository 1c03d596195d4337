use ab_glyph::FontVec;
use image::{GenericImageView, Rgb};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use std::path::{Path, PathBuf};

use crate::conversion::{center_to_pixel, pixel_to_normalized, SizeFilter};
use crate::draw::{draw_box, draw_caption, save_image, BOX_THICKNESS};
use crate::error::{LabelError, Result};
use crate::inference::Detector;
use crate::io::{
    append_report, copy_image_into, create_dataset_yaml, discover_images, label_path_for,
    setup_assist_directories, write_label_file, write_summary, AssistOutputDirs, ReportKind,
};
use crate::progress::RunState;
use crate::types::{ClassList, ProcessingStats, YoloLabel};
use crate::utils::{make_rng, output_file_name, output_stem};

/// Settings of one model-assisted labeling run
pub struct AssistJob {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub classes: ClassList,
    pub size_filter: SizeFilter,
    pub no_detection_report: bool,
    pub multi_detection_report: bool,
    pub allow_multiple: bool,
    /// Chance of an annotated image also being saved as a preview
    pub preview_rate: f32,
    pub seed: Option<u64>,
    /// Caption font; boxes are drawn without captions when absent
    pub font: Option<FontVec>,
}

/// Input images and output folders of a run, resolved before it starts
#[derive(Debug, Clone)]
pub struct AssistPlan {
    pub images: Vec<PathBuf>,
    pub dirs: AssistOutputDirs,
}

/// Find the input images and create the output, report and preview folders.
pub fn plan_assist_run(job: &AssistJob) -> Result<AssistPlan> {
    let images = discover_images(&job.input_dir)?;
    if images.is_empty() {
        return Err(LabelError::NoImages(job.input_dir.clone()));
    }
    let dirs = setup_assist_directories(&job.output_dir)?;
    Ok(AssistPlan { images, dirs })
}

/// Detect, filter and label every image in order, sorting each one into the
/// labeled or rejected folders.
///
/// Problems with a single image are logged and counted; the run goes on. The
/// summary and `dataset.yaml` are written even when the run is cancelled.
pub fn run_assisted_labeling<D>(
    job: &AssistJob,
    plan: &AssistPlan,
    detector: &mut D,
    state: &RunState,
) -> Result<ProcessingStats>
where
    D: Detector + ?Sized,
{
    state.set_total_steps(plan.images.len());
    let mut stats = ProcessingStats::new(plan.images.len());
    let mut rng = make_rng(job.seed);

    for image_path in &plan.images {
        if state.is_cancelled() {
            stats.cancelled = true;
            break;
        }
        let name = output_file_name(image_path);
        state.advance(&format!("Processing: {}", name));

        if let Err(e) = label_image(image_path, job, &plan.dirs, detector, &mut rng, &mut stats) {
            error!("Failed to process {}: {}", name, e);
            stats.failed += 1;
        }
    }

    write_summary(&plan.dirs.report_dir.join("summary.json"), &stats)?;
    create_dataset_yaml(&plan.dirs.dataset_dir, &job.classes)?;
    info!("Reports written to {}", plan.dirs.report_dir.display());
    Ok(stats)
}

fn label_image<D>(
    image_path: &Path,
    job: &AssistJob,
    dirs: &AssistOutputDirs,
    detector: &mut D,
    rng: &mut StdRng,
    stats: &mut ProcessingStats,
) -> Result<()>
where
    D: Detector + ?Sized,
{
    let image = match image::open(image_path) {
        Ok(image) => image,
        Err(e) => {
            warn!("Failed to read image {}: {}", image_path.display(), e);
            stats.skipped_unreadable += 1;
            return Ok(());
        }
    };
    let detections = detector.detect(&image)?;
    let stem = output_stem(image_path);
    debug!("{}: {} detection(s)", stem, detections.len());

    if detections.is_empty() {
        stats.no_detection += 1;
        if job.no_detection_report {
            append_report(&dirs.report_dir, ReportKind::NoDetection, &stem)?;
            write_label_file(&label_path_for(&dirs.no_detection_labels_dir, image_path), &[])?;
        }
        copy_image_into(image_path, &dirs.no_detections_dir)?;
        return Ok(());
    }

    if detections.len() > 1 && !job.allow_multiple {
        stats.multiple_detections += 1;
        append_report(&dirs.report_dir, ReportKind::MoreThanOne, &stem)?;
        copy_image_into(image_path, &dirs.no_detections_dir)?;
        return Ok(());
    }

    // The class comes from the file name, not from the model
    let class_id = job.classes.match_prefix(&output_file_name(image_path));
    let color = Rgb(ClassList::color(class_id));
    let (width, height) = image.dimensions();
    let mut annotated = image.to_rgb8();
    let mut labels = Vec::with_capacity(detections.len());
    let mut rejected = false;

    for detection in &detections {
        let bbox = pixel_to_normalized(
            detection.x_center,
            detection.y_center,
            detection.width,
            detection.height,
            width,
            height,
        );
        if !job.size_filter.accepts(bbox.width, bbox.height) {
            debug!(
                "{}: box {:.3}x{:.3} outside the size ranges",
                stem, bbox.width, bbox.height
            );
            append_report(&dirs.report_dir, ReportKind::OutOfRange, &stem)?;
            if !rejected {
                copy_image_into(image_path, &dirs.no_detections_dir)?;
                rejected = true;
            }
            continue;
        }

        let px = center_to_pixel(
            detection.x_center,
            detection.y_center,
            detection.width,
            detection.height,
        );
        draw_box(&mut annotated, &px, color, BOX_THICKNESS);
        if let Some(font) = &job.font {
            let caption = format!(
                "{} {:.2}",
                job.classes.name(class_id).unwrap_or("unknown"),
                detection.confidence
            );
            draw_caption(&mut annotated, &px, color, font, &caption);
        }
        labels.push(YoloLabel::new(class_id, bbox));
    }
    if rejected {
        stats.out_of_range += 1;
    }

    if !labels.is_empty() {
        write_label_file(&label_path_for(&dirs.labels_dir, image_path), &labels)?;
        let annotated_name = format!("{}.jpg", stem);
        save_image(&annotated, &dirs.detections_dir.join(&annotated_name))?;
        copy_image_into(image_path, &dirs.images_dir)?;
        stats.labeled += 1;
        stats.drawn += 1;
        stats.boxes_written += labels.len();

        if rng.gen::<f32>() < job.preview_rate {
            save_image(&annotated, &dirs.preview_dir.join(&annotated_name))?;
        }
    }

    if detections.len() >= 2 && job.multi_detection_report {
        append_report(&dirs.report_dir, ReportKind::MultipleDetections, &stem)?;
    }
    Ok(())
}
