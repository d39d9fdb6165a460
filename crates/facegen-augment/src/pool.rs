//! Source pool loading for one person directory.
//!
//! A pool is the ordered list of candidate source files. Files are not decoded
//! while the pool is built; decoding happens one entry at a time through
//! [`SourcePool::decode`].

use std::{
    cmp::Ordering,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use image::{ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{DatasetError, DatasetResult};

/// Width of the zero-padded index in generated file names.
pub const INDEX_WIDTH: usize = 4;

/// Options controlling which files join a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Accepted file extensions without the leading dot, compared
    /// case-sensitively. Their order is the order of the pool groups.
    pub extensions: Vec<String>,
    /// Whether files named like generator output (`<person>_0001.jpg`)
    /// are used as sources.
    pub include_generated: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            include_generated: true,
        }
    }
}

impl PoolOptions {
    fn extension_rank(&self, path: &Path) -> Option<usize> {
        let extension = path.extension().and_then(OsStr::to_str)?;
        self.extensions
            .iter()
            .position(|accepted| accepted.trim_start_matches('.') == extension)
    }
}

/// Ordered, non-empty set of source files for one person
#[derive(Debug, Clone)]
pub struct SourcePool {
    dir: PathBuf,
    entries: Vec<PathBuf>,
}

impl SourcePool {
    /// Scan `dir` (non-recursively) for source images.
    ///
    /// Entries are grouped by extension in the order of
    /// [`PoolOptions::extensions`] and sorted by file name within a group.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::DirectoryReadFailed`] if the directory cannot be
    /// walked and [`DatasetError::EmptyPool`] if no file matches.
    pub fn load(dir: impl AsRef<Path>, options: &PoolOptions) -> DatasetResult<Self> {
        let dir = dir.as_ref();
        let person = dir.file_name().and_then(OsStr::to_str);

        let mut ranked = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
            let entry = entry.map_err(|source| DatasetError::DirectoryReadFailed {
                path: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            let Some(rank) = options.extension_rank(&path) else {
                continue;
            };
            if !options.include_generated
                && person.is_some_and(|person| is_generated_file(&path, person))
            {
                continue;
            }
            ranked.push((rank, path));
        }

        ranked.sort_by(|(rank_a, a), (rank_b, b)| match rank_a.cmp(rank_b) {
            Ordering::Equal => a.file_name().cmp(&b.file_name()),
            other => other,
        });

        Self::from_entries(dir, ranked.into_iter().map(|(_, path)| path).collect())
    }

    /// Build a pool from an explicit, already ordered list of files.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::EmptyPool`] if `entries` is empty.
    pub fn from_entries(dir: impl Into<PathBuf>, entries: Vec<PathBuf>) -> DatasetResult<Self> {
        let dir = dir.into();
        if entries.is_empty() {
            return Err(DatasetError::EmptyPool { path: dir });
        }
        Ok(Self { dir, entries })
    }

    /// Directory the pool was read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map a monotonically increasing pointer onto a pool position.
    pub fn cycle_index(&self, pointer: usize) -> usize {
        pointer % self.entries.len()
    }

    /// Decode the entry at `index` into an 8-bit RGB image.
    ///
    /// The format is sniffed from the file contents, so a mislabelled
    /// extension still decodes.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ImageDecodeFailed`] if the file cannot be read
    /// or is not a decodable image.
    pub fn decode(&self, index: usize) -> DatasetResult<RgbImage> {
        let path = &self.entries[self.cycle_index(index)];
        let decode_failed = |source| DatasetError::ImageDecodeFailed {
            path: path.clone(),
            source,
        };

        let image = ImageReader::open(path)
            .and_then(ImageReader::with_guessed_format)
            .map_err(|e| decode_failed(image::ImageError::IoError(e)))?
            .decode()
            .map_err(decode_failed)?;

        Ok(image.into_rgb8())
    }
}

/// File name of the `index`-th generated image of `person`.
pub fn output_file_name(person: &str, index: usize) -> String {
    format!("{person}_{index:0width$}.jpg", width = INDEX_WIDTH)
}

/// Whether `path` looks like generator output for `person`.
pub fn is_generated_file(path: &Path, person: &str) -> bool {
    path.file_stem()
        .and_then(OsStr::to_str)
        .and_then(|stem| stem.strip_prefix(person))
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|digits| {
            digits.len() >= INDEX_WIDTH && digits.bytes().all(|b| b.is_ascii_digit())
        })
}
