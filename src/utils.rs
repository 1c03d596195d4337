use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LabelError, Result};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}}) {{msg}}",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create an output directory if it does not exist yet. Existing contents are
/// kept, so repeated runs add to the same folders.
pub fn create_output_directory(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        log::debug!("Creating folder {}", path.display());
    }
    fs::create_dir_all(path).map_err(|e| LabelError::io(path, e))?;
    Ok(path.to_path_buf())
}

/// File stem as a sanitized string usable for derived output names.
pub fn output_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_filename::sanitize(stem)
}

/// File name (with extension) as a sanitized string.
pub fn output_file_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_filename::sanitize(name)
}

/// Random number generator seeded when a seed is given, from entropy otherwise.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Pick `fraction` of the items at random, never fewer than one when the
/// input is non-empty. The result keeps the input order.
pub fn sample_fraction<T: Clone>(items: &[T], fraction: f32, rng: &mut StdRng) -> Vec<T> {
    if items.is_empty() {
        return Vec::new();
    }
    let count = ((items.len() as f32 * fraction) as usize).clamp(1, items.len());
    let mut indices: Vec<usize> = (0..items.len()).collect();
    indices.shuffle(rng);
    let mut chosen: Vec<usize> = indices.into_iter().take(count).collect();
    chosen.sort_unstable();
    chosen.into_iter().map(|i| items[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_fraction_never_empty() {
        let mut rng = make_rng(Some(42));
        let items: Vec<u32> = (0..5).collect();
        assert_eq!(sample_fraction(&items, 0.1, &mut rng).len(), 1);
        assert_eq!(sample_fraction(&items, 1.0, &mut rng), items);
        assert!(sample_fraction::<u32>(&[], 0.5, &mut rng).is_empty());
    }

    #[test]
    fn sample_fraction_is_reproducible_with_seed() {
        let items: Vec<u32> = (0..100).collect();
        let a = sample_fraction(&items, 0.1, &mut make_rng(Some(7)));
        let b = sample_fraction(&items, 0.1, &mut make_rng(Some(7)));
        assert_eq!(a.len(), 10);
        assert_eq!(a, b);
    }

    #[test]
    fn create_output_directory_keeps_existing_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("labels");
        create_output_directory(&dir).unwrap();
        fs::write(dir.join("keep.txt"), "0 0.5 0.5 0.1 0.1\n").unwrap();
        create_output_directory(&dir).unwrap();
        assert!(dir.join("keep.txt").exists());
    }

    #[test]
    fn output_names_come_from_the_path() {
        let path = Path::new("/data/in/Foam_0001.JPG");
        assert_eq!(output_stem(path), "Foam_0001");
        assert_eq!(output_file_name(path), "Foam_0001.JPG");
    }
}
