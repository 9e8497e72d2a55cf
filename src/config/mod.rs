//! Resolving and loading an experiment's configuration.

pub mod channels;
pub mod linearization;

pub use channels::{ChannelIndices, ChannelLayout, ChannelRole};
pub use linearization::{CurveType, Linearization, LinearizationTable, PixelCoefficients};

use std::{
    fmt::Display,
    io::{BufReader, Read, Seek},
    path::{Path, PathBuf},
    str::FromStr,
};

use log::debug;
use ndarray::{Array1, Axis, Ix1, Ix2};
use serde::de::DeserializeOwned;
use zip::{result::ZipError, ZipArchive};

use crate::{read::npy, AggregateError};

const ANALOG_INPUT_CONFIG_POSTFIX: &str = " analog input configuration.json";

/// The laboratory an experiment was run in. This decides the names of the
/// entries inside the hardware configuration archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Laboratory {
    #[default]
    ILab,
}

impl Laboratory {
    /// The short identifier, e.g. "i-lab".
    pub fn id(self) -> &'static str {
        match self {
            Laboratory::ILab => "i-lab",
        }
    }

    /// The name used in configuration entry names, e.g. "I-Lab".
    pub fn display_name(self) -> &'static str {
        match self {
            Laboratory::ILab => "I-Lab",
        }
    }
}

impl FromStr for Laboratory {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i-lab" => Ok(Laboratory::ILab),
            _ => Err(AggregateError::UnknownLaboratory(s.to_string())),
        }
    }
}

impl Display for Laboratory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// The names of an experiment's files, derived from the experiment id and the
/// laboratory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNames {
    pub config_zip: String,
    pub raw_data_folder: String,

    /// Entries inside the config archive.
    pub analog_input_config: String,
    pub pixel_linearization: String,

    pub delay_file: String,
    pub probe_wn_axis_file: String,
    pub background_file: String,
}

impl FileNames {
    pub fn new(experiment: &str, laboratory: Laboratory) -> FileNames {
        FileNames {
            config_zip: format!("hwconfigxxx_{experiment}.zip"),
            raw_data_folder: "raw_data".to_string(),
            analog_input_config: format!(
                "{}{ANALOG_INPUT_CONFIG_POSTFIX}",
                laboratory.display_name()
            ),
            pixel_linearization: format!("{}_pixel_linearization_final.json", laboratory.id()),
            delay_file: format!("delay_file_{experiment}.npy"),
            probe_wn_axis_file: format!("probe_wn_axis_{experiment}.npy"),
            background_file: format!("background_{experiment}.npy"),
        }
    }
}

/// Where an experiment lives and what its files are called. Constructing one
/// touches nothing on disk; the `load_*`/`get_*` methods each read one thing.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// The directory holding all experiments.
    pub base_path: PathBuf,

    /// The experiment id, e.g. "20230213_KI_test_30_000".
    pub experiment: String,

    pub laboratory: Laboratory,

    /// `<base_path>/<experiment>`
    pub path: PathBuf,

    pub names: FileNames,
}

/// The decoded contents of the hardware configuration archive.
#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub channels: ChannelLayout,
    pub linearization_table: LinearizationTable,

    /// Describes where `linearization_table` came from.
    linearization_source: String,
}

impl ConfigBundle {
    pub fn get_indices(&self) -> ChannelIndices {
        self.channels.get_indices()
    }

    /// Build the linearization model. The coefficient vectors are sized by the
    /// number of probe pixels in `indices`.
    pub fn get_linearization_params(
        &self,
        indices: &ChannelIndices,
    ) -> Result<Linearization, AggregateError> {
        Linearization::from_table(
            &self.linearization_table,
            indices,
            &self.linearization_source,
        )
    }
}

/// A fully loaded experiment configuration.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub channels: ChannelLayout,
    pub indices: ChannelIndices,
    pub linearization: Linearization,
}

impl ExperimentConfig {
    pub fn new<P: AsRef<Path>, S: Into<String>>(
        base_path: P,
        experiment: S,
        laboratory: Laboratory,
    ) -> ExperimentConfig {
        let base_path = base_path.as_ref().to_path_buf();
        let experiment = experiment.into();
        let names = FileNames::new(&experiment, laboratory);
        let path = base_path.join(&experiment);
        ExperimentConfig {
            base_path,
            experiment,
            laboratory,
            path,
            names,
        }
    }

    pub fn config_zip_path(&self) -> PathBuf {
        self.path.join(&self.names.config_zip)
    }

    pub fn raw_data_path(&self) -> PathBuf {
        self.path.join(&self.names.raw_data_folder)
    }

    /// Where the aggregated tensor is saved: `<base_path>/<experiment>.npy`.
    pub fn output_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.npy", self.experiment))
    }

    /// Read the channel layout and linearization table from the hardware
    /// configuration archive.
    pub fn load_config_zip(&self) -> Result<ConfigBundle, AggregateError> {
        let zip_path = self.config_zip_path();
        debug!("Using hardware config archive: {}", zip_path.display());

        let file = npy::open_file("Hardware config archive", &zip_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| AggregateError::format(zip_path.display(), e))?;

        let channels: ChannelLayout =
            read_json_entry(&mut archive, &zip_path, &self.names.analog_input_config)?;
        let linearization_table: LinearizationTable =
            read_json_entry(&mut archive, &zip_path, &self.names.pixel_linearization)?;
        debug!("Number of analog input channels: {}", channels.len());

        Ok(ConfigBundle {
            channels,
            linearization_table,
            linearization_source: entry_description(&zip_path, &self.names.pixel_linearization),
        })
    }

    /// The delay of each delay step. The delay file holds at least two
    /// columns; the delays are the first.
    pub fn get_delays(&self) -> Result<Array1<f64>, AggregateError> {
        let path = self.path.join(&self.names.delay_file);
        let delays = npy::read_npy::<Ix2>("Delay file", &path)?;
        if delays.ncols() < 2 {
            return Err(AggregateError::format(
                path.display(),
                format!("expected at least 2 columns, got {}", delays.ncols()),
            ));
        }
        let delays = delays.index_axis_move(Axis(1), 0);
        debug!("Number of delays in delay file: {}", delays.len());
        Ok(delays)
    }

    pub fn get_probe_wn_axis(&self) -> Result<Array1<f64>, AggregateError> {
        let path = self.path.join(&self.names.probe_wn_axis_file);
        npy::read_npy::<Ix1>("Probe wavenumber axis file", &path)
    }

    /// One background value per analog input channel.
    pub fn get_background(&self) -> Result<Array1<f64>, AggregateError> {
        let path = self.path.join(&self.names.background_file);
        npy::read_npy::<Ix1>("Background file", &path)
    }

    /// Load the configuration archive and derive everything from it.
    pub fn load(&self) -> Result<Experiment, AggregateError> {
        let bundle = self.load_config_zip()?;
        let indices = bundle.get_indices();
        debug!(
            "Probe pixels: {}, reference pixels: {}, choppers: {}, R2R: {}",
            indices.probe_pixels.len(),
            indices.reference_pixels.len(),
            indices.choppers.len(),
            indices.r2r.len()
        );
        let linearization = bundle.get_linearization_params(&indices)?;
        Ok(Experiment {
            channels: bundle.channels,
            indices,
            linearization,
        })
    }
}

fn entry_description(zip_path: &Path, entry: &str) -> String {
    format!("'{entry}' in {}", zip_path.display())
}

/// Decode the JSON entry `name` of `archive`.
fn read_json_entry<T: DeserializeOwned, R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    zip_path: &Path,
    name: &str,
) -> Result<T, AggregateError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(AggregateError::not_found(
                format!("Archive entry '{name}'"),
                zip_path,
            ))
        }
        Err(e) => return Err(AggregateError::format(zip_path.display(), e)),
    };
    serde_json::from_reader(BufReader::new(entry))
        .map_err(|e| AggregateError::format(entry_description(zip_path, name), e))
}
