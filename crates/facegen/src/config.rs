//! Configuration for dataset generation runs.
//!
//! A [`GeneratorConfig`] is usually loaded from an optional JSON file and then
//! patched with command-line overrides before [`GeneratorConfig::validate`]
//! is called.

use std::path::{Path, PathBuf};

use facegen_augment::{
    NoiseSeed, PoolOptions, QuotaGenerator, TransformPipeline, DEFAULT_JPEG_QUALITY,
    DEFAULT_PROGRESS_INTERVAL, DEFAULT_QUOTA,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}'")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}'")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Settings shared by every person of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Base directory holding one subdirectory per person.
    pub dataset_path: PathBuf,
    /// Images generated per person.
    pub quota: usize,
    /// Images between two progress messages.
    pub progress_interval: usize,
    /// Accepted source extensions, without the leading dot.
    pub extensions: Vec<String>,
    /// Whether earlier generator output is reused as source material.
    pub include_generated: bool,
    /// JPEG quality of written images (1-100).
    pub jpeg_quality: u8,
    /// Randomness policy of the noise variants.
    pub noise_seed: NoiseSeed,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let pool = PoolOptions::default();
        Self {
            dataset_path: PathBuf::from("dataset"),
            quota: DEFAULT_QUOTA,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            extensions: pool.extensions,
            include_generated: pool.include_generated,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            noise_seed: NoiseSeed::Unseeded,
        }
    }
}

impl GeneratorConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadFailed`] or [`ConfigError::ParseFailed`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        if self.quota == 0 {
            return invalid("quota must be at least 1");
        }
        if self.progress_interval == 0 {
            return invalid("progress_interval must be at least 1");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return invalid("jpeg_quality must be between 1 and 100");
        }
        if self.extensions.is_empty() {
            return invalid("at least one source extension is required");
        }
        if self
            .extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.').is_empty())
        {
            return invalid("source extensions must not be empty");
        }
        Ok(())
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            extensions: self.extensions.clone(),
            include_generated: self.include_generated,
        }
    }

    pub fn generator(&self) -> QuotaGenerator {
        QuotaGenerator::new(TransformPipeline::new(self.noise_seed), self.quota)
            .with_progress_interval(self.progress_interval)
    }
}
