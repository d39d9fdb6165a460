//! Augmented face dataset generation.
//!
//! A person's source images form a [`SourcePool`]; the [`QuotaGenerator`]
//! cycles through it, expands every source with the [`TransformPipeline`]
//! and writes exactly `quota` images through an [`ImageSink`].

pub mod augmentation;
pub mod error;
pub mod generator;
pub mod pool;
pub mod sink;

// Re-export commonly used types
pub use augmentation::{NoiseSeed, TransformPipeline, Variant};
pub use error::{DatasetError, DatasetResult};
pub use generator::{PersonReport, QuotaGenerator, DEFAULT_PROGRESS_INTERVAL, DEFAULT_QUOTA};
pub use pool::{is_generated_file, output_file_name, PoolOptions, SourcePool};
pub use sink::{AugmentedImage, ImageSink, JpegDirectorySink, DEFAULT_JPEG_QUALITY};
