//! Destinations for augmented images.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use image::{codecs::jpeg::JpegEncoder, RgbImage};

use crate::{
    augmentation::Variant,
    error::{DatasetError, DatasetResult},
    pool::output_file_name,
};

/// Default JPEG quality of written images.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// One derived image together with its place in the person's output set.
#[derive(Debug, Clone)]
pub struct AugmentedImage {
    /// 1-based sequence index within the person's output set.
    pub index: usize,
    /// Pool position of the source image.
    pub source: usize,
    /// Position of the variant within the source's batch.
    pub position: usize,
    pub variant: Variant,
    pub image: RgbImage,
}

/// Receives augmented images in sequence order.
pub trait ImageSink {
    /// Persist one augmented image of `person`.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the image cannot be stored; the
    /// generator stops the person's pass on the first failure.
    fn persist(&mut self, person: &str, augmented: &AugmentedImage) -> DatasetResult<()>;
}

/// Writes `<person>_<NNNN>.jpg` files into a directory.
///
/// Existing files with the same name are overwritten.
#[derive(Debug, Clone)]
pub struct JpegDirectorySink {
    dir: PathBuf,
    quality: u8,
}

impl JpegDirectorySink {
    pub fn new(dir: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            dir: dir.into(),
            quality: quality.clamp(1, 100),
        }
    }

    /// Path the image with sequence `index` of `person` is written to.
    pub fn output_path(&self, person: &str, index: usize) -> PathBuf {
        self.dir.join(output_file_name(person, index))
    }
}

impl ImageSink for JpegDirectorySink {
    fn persist(&mut self, person: &str, augmented: &AugmentedImage) -> DatasetResult<()> {
        let path = self.output_path(person, augmented.index);
        let file = File::create(&path).map_err(|source| DatasetError::OutputCreateFailed {
            path: path.clone(),
            source,
        })?;

        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.quality);
        augmented
            .image
            .write_with_encoder(encoder)
            .and_then(|()| writer.flush().map_err(image::ImageError::IoError))
            .map_err(|source| DatasetError::ImageSaveFailed { path, source })
    }
}
