//! Error types for the facegen-augment crate.
//!
//! Every variant carries the path it concerns so that per-person failures can
//! be reported without further context from the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for source pool, generation and persistence operations.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Error when the base dataset directory does not exist.
    #[error("Dataset directory not found: {path}")]
    DatasetDirectoryNotFound {
        /// The expected dataset directory path.
        path: PathBuf,
    },

    /// Error when a requested person has no directory under the dataset.
    #[error("Person directory not found: {path}")]
    PersonNotFound {
        /// The expected person directory path.
        path: PathBuf,
    },

    /// Error when reading a directory fails.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory path that failed to read.
        path: PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// Error when a person directory holds no file with an accepted extension.
    #[error("No source images found in: {path}")]
    EmptyPool {
        /// The person directory that was scanned.
        path: PathBuf,
    },

    /// Error when a single source file cannot be opened or decoded.
    ///
    /// The quota generator recovers from this locally by moving on to the
    /// next pool entry.
    #[error("Failed to decode image: {path}")]
    ImageDecodeFailed {
        /// The image file path that failed to decode.
        path: PathBuf,
        /// The underlying image processing error.
        #[source]
        source: image::ImageError,
    },

    /// Error when a full pass over the pool produced no decodable image.
    #[error("None of the {attempted} source images in {path} could be decoded")]
    NoDecodableSource {
        /// The person directory backing the pool.
        path: PathBuf,
        /// Number of consecutive decode attempts that failed.
        attempted: usize,
    },

    /// Error when creating an output file fails.
    #[error("Failed to create output file: {path}")]
    OutputCreateFailed {
        /// The output file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error when encoding or writing an augmented image fails.
    #[error("Failed to save image: {path}")]
    ImageSaveFailed {
        /// The output file path.
        path: PathBuf,
        /// The underlying image processing error.
        #[source]
        source: image::ImageError,
    },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
