//! Aggregating an experiment's raw scans into one tensor.

use std::path::PathBuf;

use log::{debug, info, trace};
use ndarray::{ArrayD, Axis, IxDyn};
use rayon::prelude::*;

use crate::{config::ExperimentConfig, read::ScanLayout, write::write_npy_atomic, AggregateError};

/// The aggregated raw data, shaped `[delay, scan, *scan_shape]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
    pub data: ArrayD<f64>,

    /// The shape of a single scan's array.
    pub scan_shape: Vec<usize>,
}

impl RawTensor {
    pub fn num_delays(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn num_scans(&self) -> usize {
        self.data.len_of(Axis(1))
    }
}

/// Collects the raw scans of one experiment.
///
/// The stages are explicit: [`DataAggregator::open`] lists the raw data
/// directory, [`DataAggregator::preallocate`] sizes the tensor,
/// [`DataAggregator::load`] fills it and [`DataAggregator::save`] writes it
/// out. [`DataAggregator::run`] does all of them in order.
#[derive(Debug, Clone)]
pub struct DataAggregator {
    config: ExperimentConfig,
    layout: ScanLayout,
}

impl DataAggregator {
    /// List the experiment's raw data directory. The listing is made once here
    /// and reused by every later stage.
    pub fn open(config: ExperimentConfig) -> Result<DataAggregator, AggregateError> {
        debug!("Opening experiment {}", config.experiment);
        let layout = ScanLayout::discover(&config.raw_data_path())?;
        Ok(DataAggregator { config, layout })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn layout(&self) -> &ScanLayout {
        &self.layout
    }

    /// Read the first scan to learn the per-scan shape and allocate a zeroed
    /// tensor of shape `[num_delays, num_scans, *scan_shape]`.
    pub fn preallocate(&self) -> Result<RawTensor, AggregateError> {
        let first = self.layout.first_scan().read()?;
        let scan_shape = first.shape().to_vec();

        let mut shape = vec![self.layout.num_delays(), self.layout.num_scans()];
        shape.extend_from_slice(&scan_shape);
        debug!("Raw tensor shape: {shape:?}");

        Ok(RawTensor {
            data: ArrayD::zeros(IxDyn(&shape)),
            scan_shape,
        })
    }

    /// Read every scan into `tensor` at `[delay_index, scan_index, ...]`, the
    /// indices being positions in the listing made by [`DataAggregator::open`].
    ///
    /// Delays are read in parallel; each one writes only its own slice of the
    /// tensor. Any scan whose shape differs from `tensor.scan_shape` is an
    /// error.
    pub fn load(&self, tensor: &mut RawTensor) -> Result<(), AggregateError> {
        if tensor.num_delays() != self.layout.num_delays()
            || tensor.num_scans() != self.layout.num_scans()
        {
            return Err(AggregateError::inconsistent(
                &self.layout.raw_data,
                format!(
                    "tensor has room for {}x{} scans, but the listing has {}x{}",
                    tensor.num_delays(),
                    tensor.num_scans(),
                    self.layout.num_delays(),
                    self.layout.num_scans()
                ),
            ));
        }

        let scan_shape = tensor.scan_shape.as_slice();
        tensor
            .data
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(self.layout.delays.par_iter())
            .enumerate()
            .try_for_each(|(i_delay, (mut delay_data, delay))| {
                for (i_scan, scan) in delay.scans.iter().enumerate() {
                    trace!(
                        "Loading {}, into i_delay={i_delay}, i_scan={i_scan}.",
                        scan.path.display()
                    );
                    let array = scan.read()?;
                    if array.shape() != scan_shape {
                        return Err(AggregateError::inconsistent(
                            &scan.path,
                            format!(
                                "scan has shape {:?}, expected {scan_shape:?}",
                                array.shape()
                            ),
                        ));
                    }
                    delay_data.index_axis_mut(Axis(0), i_scan).assign(&array);
                }
                Ok(())
            })?;

        info!(
            "Loaded {} delays x {} scans for {}",
            self.layout.num_delays(),
            self.layout.num_scans(),
            self.config.experiment
        );
        Ok(())
    }

    /// Write `tensor` to `<base_path>/<experiment>.npy`, replacing any
    /// existing file. Returns the path written.
    pub fn save(&self, tensor: &RawTensor) -> Result<PathBuf, AggregateError> {
        let path = self.config.output_path();
        write_npy_atomic(&path, &tensor.data)?;
        Ok(path)
    }

    /// Open, preallocate, load and save. Nothing is written unless every scan
    /// was loaded.
    pub fn run(config: ExperimentConfig) -> Result<RawTensor, AggregateError> {
        let aggregator = DataAggregator::open(config)?;
        let mut tensor = aggregator.preallocate()?;
        aggregator.load(&mut tensor)?;
        aggregator.save(&tensor)?;
        Ok(tensor)
    }
}
