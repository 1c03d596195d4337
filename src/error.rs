use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a labeling run.
///
/// Per-image problems (unreadable photos, malformed label lines) are logged and
/// skipped by the pipelines; only failures that make the rest of the run
/// meaningless surface as a `LabelError`.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode or encode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("folder {0} does not exist")]
    MissingFolder(PathBuf),

    #[error("no image files found in {0}")]
    NoImages(PathBuf),

    #[error("invalid label line {line:?}: {reason}")]
    InvalidLabel { line: String, reason: String },

    #[error("failed to load model {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },

    #[error("failed to parse font file {0}")]
    Font(PathBuf),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Ort(#[from] ort::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

impl LabelError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LabelError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        LabelError::Image {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LabelError>;
