//! One-off visual checks: the preset box on a sample image, and existing
//! label files drawn onto a random subset of a dataset.

use log::{info, warn};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::draw::{draw_labels, render_preview, save_image, LABEL_COLOR};
use crate::error::{LabelError, Result};
use crate::io::{discover_images, label_path_for, read_label_file};
use crate::types::NormalizedBox;
use crate::utils::{create_output_directory, make_rng, output_file_name, sample_fraction};

/// Draw `bbox` on a randomly chosen image from `input_dir` and save the
/// thumbnail to `output`. Returns the image that was picked.
pub fn run_preview(
    input_dir: &Path,
    bbox: &NormalizedBox,
    seed: Option<u64>,
    output: &Path,
) -> Result<PathBuf> {
    let images = discover_images(input_dir)?;
    let mut rng = make_rng(seed);
    let chosen = images
        .choose(&mut rng)
        .cloned()
        .ok_or_else(|| LabelError::NoImages(input_dir.to_path_buf()))?;

    let image = image::open(&chosen).map_err(|e| LabelError::image(&chosen, e))?;
    let preview = render_preview(&image, bbox);
    save_image(&preview, output)?;
    info!(
        "Preview of {} saved to {}",
        output_file_name(&chosen),
        output.display()
    );
    Ok(chosen)
}

/// Draw the labels of a random `fraction` of the labeled images into
/// `output_dir`. Only images with a label file are sampled. Returns the
/// number of images written.
pub fn draw_label_samples(
    images_dir: &Path,
    labels_dir: &Path,
    output_dir: &Path,
    fraction: f32,
    seed: Option<u64>,
) -> Result<usize> {
    let images = discover_images(images_dir)?;
    if images.is_empty() {
        return Err(LabelError::NoImages(images_dir.to_path_buf()));
    }

    let (labeled, unlabeled): (Vec<PathBuf>, Vec<PathBuf>) = images
        .into_iter()
        .partition(|path| label_path_for(labels_dir, path).exists());
    for path in &unlabeled {
        warn!("No label file for {}", output_file_name(path));
    }

    let mut rng = make_rng(seed);
    let selected = sample_fraction(&labeled, fraction, &mut rng);
    create_output_directory(output_dir)?;

    let drawn = selected
        .par_iter()
        .filter(|image_path| match draw_sample(image_path, labels_dir, output_dir) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        })
        .count();

    info!(
        "Drew labels on {} of {} labeled images into {}",
        drawn,
        labeled.len(),
        output_dir.display()
    );
    Ok(drawn)
}

fn draw_sample(image_path: &Path, labels_dir: &Path, output_dir: &Path) -> Result<()> {
    let mut img = image::open(image_path)
        .map_err(|e| LabelError::image(image_path, e))?
        .to_rgb8();
    let labels = read_label_file(&label_path_for(labels_dir, image_path))?;
    draw_labels(&mut img, &labels, LABEL_COLOR);
    save_image(&img, &output_dir.join(output_file_name(image_path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::fs;

    #[test]
    fn preview_is_written_as_thumbnail() {
        let temp_dir = tempfile::tempdir().unwrap();
        RgbImage::new(1000, 500)
            .save(temp_dir.path().join("ring_1.png"))
            .unwrap();
        let output = temp_dir.path().join("preview/preview.png");

        let chosen = run_preview(
            temp_dir.path(),
            &NormalizedBox::new(0.5, 0.5, 0.4, 0.6),
            Some(1),
            &output,
        )
        .unwrap();

        assert!(chosen.ends_with("ring_1.png"));
        let preview = image::open(&output).unwrap();
        assert_eq!((preview.width(), preview.height()), (400, 200));
    }

    #[test]
    fn preview_of_empty_folder_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = run_preview(
            temp_dir.path(),
            &NormalizedBox::new(0.5, 0.5, 0.4, 0.6),
            None,
            &temp_dir.path().join("p.png"),
        );
        assert!(matches!(result, Err(LabelError::NoImages(_))));
    }

    #[test]
    fn only_labeled_images_are_sampled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let images = temp_dir.path().join("images");
        let labels = temp_dir.path().join("labels");
        let output = temp_dir.path().join("drawn");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&labels).unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            RgbImage::new(40, 40).save(images.join(name)).unwrap();
        }
        fs::write(labels.join("b.txt"), "0 0.5 0.5 0.5 0.5\n").unwrap();

        let drawn = draw_label_samples(&images, &labels, &output, 0.1, Some(3)).unwrap();

        assert_eq!(drawn, 1);
        let img = image::open(output.join("b.png")).unwrap().to_rgb8();
        assert_eq!(*img.get_pixel(10, 20), LABEL_COLOR);
        assert!(!output.join("a.png").exists());
    }
}
