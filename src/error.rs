use std::path::PathBuf;
use thiserror::Error;

use crate::mat::MatError;

/// The main error type for searchset operations.
#[derive(Debug, Error)]
pub enum SearchsetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Annotation file not found: {path}")]
    AnnotationMissing { path: PathBuf },

    #[error("Failed to parse MAT file {path}: {source}")]
    Mat {
        path: PathBuf,
        #[source]
        source: MatError,
    },

    #[error("Unexpected annotation schema in {path}: {message}")]
    MatSchema { path: PathBuf, message: String },

    #[error("Image '{image}' has no valid boxes")]
    NoValidBoxes { image: String },

    #[error("Image file not found: {path}")]
    ImageMissing { path: PathBuf },

    #[error("Failed to read dimensions of image {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to read roidb cache {path}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write roidb cache {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown split '{0}' (expected 'train' or 'test')")]
    UnknownSplit(String),

    #[error("No dataset registered under '{0}'")]
    UnknownDataset(String),

    #[error("Dataset '{0}' is already registered")]
    DatasetAlreadyRegistered(String),
}
