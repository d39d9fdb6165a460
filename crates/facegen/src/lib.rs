//! `facegen`: augmented face-recognition dataset generation.
//!
//! This crate wires the generator from `facegen-augment` to a dataset
//! directory laid out as `<dataset>/<person>/*.jpg` and provides the
//! command-line configuration layer.

pub mod config;
pub mod runner;

#[doc(inline)]
pub use facegen_augment as augment;

pub use config::{ConfigError, GeneratorConfig};
pub use runner::{DatasetRunner, PersonDir, PersonOutcome, PersonPlan, RunSummary};
