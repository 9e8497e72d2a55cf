//! Aggregate a spectroscopy instrument's raw scan files into one dense array
//! per experiment.
//!
//! An experiment lives in `<base>/<experiment>/`, holding a hardware
//! configuration archive, a few auxiliary `.npy` arrays and a `raw_data`
//! directory with one subdirectory per delay step, each containing one file
//! per scan. [`ExperimentConfig`] finds and decodes the configuration;
//! [`DataAggregator`] gathers the scans into a `[delay, scan, ...]` tensor and
//! saves it to `<base>/<experiment>.npy`.

pub mod aggregate;
pub mod config;
mod error;
pub mod read;
pub mod write;

pub use aggregate::{DataAggregator, RawTensor};
pub use config::{
    ChannelIndices, ChannelLayout, ChannelRole, ConfigBundle, CurveType, Experiment,
    ExperimentConfig, FileNames, Laboratory, Linearization,
};
pub use error::AggregateError;
