use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use ndarray::{Array1, Array2};
use ndarray_npy::{write_npy, NpzWriter};
use scan_aggregate::{ExperimentConfig, Laboratory};
use zip::{write::FileOptions, ZipWriter};

pub const EXPERIMENT: &str = "20230213_KI_test_30_000";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The value every element of a fixture scan holds.
pub fn scan_value(i_delay: usize, i_scan: usize) -> f64 {
    i_delay as f64 * 100.0 + i_scan as f64 + 0.25
}

pub fn scan_array(i_delay: usize, i_scan: usize, len: usize) -> Array1<f64> {
    Array1::from_shape_fn(len, |i| scan_value(i_delay, i_scan) + i as f64 * 1e-3)
}

pub fn write_npz(path: &Path, array: &Array1<f64>) {
    let mut npz = NpzWriter::new(File::create(path).unwrap());
    npz.add_array("arr_0", array).unwrap();
    npz.finish().unwrap();
}

/// An experiment directory under a temporary base path.
pub struct Fixture {
    pub base: tempfile::TempDir,
    pub config: ExperimentConfig,
}

impl Fixture {
    pub fn new() -> Fixture {
        init_logging();
        let base = tempfile::tempdir().unwrap();
        let config = ExperimentConfig::new(base.path(), EXPERIMENT, Laboratory::ILab);
        fs::create_dir_all(config.raw_data_path()).unwrap();
        Fixture { base, config }
    }

    pub fn delay_dir(&self, name: &str) -> PathBuf {
        let dir = self.config.raw_data_path().join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write `num_scans` scans of length `len` into each delay directory.
    /// `delay_names` are given in their intended order.
    pub fn write_scans(&self, delay_names: &[&str], num_scans: usize, len: usize) {
        for (i_delay, name) in delay_names.iter().enumerate() {
            let dir = self.delay_dir(name);
            for i_scan in 0..num_scans {
                write_npz(
                    &dir.join(format!("scan_{i_scan}.npz")),
                    &scan_array(i_delay, i_scan, len),
                );
            }
        }
    }

    pub fn write_config_zip(&self, layout_json: &str, linearization_json: &str) {
        let mut zip = ZipWriter::new(File::create(self.config.config_zip_path()).unwrap());
        zip.start_file(
            self.config.names.analog_input_config.as_str(),
            FileOptions::default(),
        )
        .unwrap();
        zip.write_all(layout_json.as_bytes()).unwrap();
        zip.start_file(
            self.config.names.pixel_linearization.as_str(),
            FileOptions::default(),
        )
        .unwrap();
        zip.write_all(linearization_json.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    pub fn write_delay_file(&self, delays: &[f64]) {
        let mut array = Array2::zeros((delays.len(), 2));
        for (i, &d) in delays.iter().enumerate() {
            array[[i, 0]] = d;
            array[[i, 1]] = i as f64;
        }
        write_npy(self.config.path.join(&self.config.names.delay_file), &array).unwrap();
    }
}
