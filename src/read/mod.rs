pub mod listing;
pub(crate) mod npy;

use std::path::{Path, PathBuf};

use log::{debug, trace};
use ndarray::ArrayD;
use vec1::Vec1;

use crate::AggregateError;
use listing::{file_name, list_sorted};

/// The file formats a raw scan may be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFormat {
    /// A numpy archive; only its first array is read.
    Npz,

    /// A bare numpy array.
    Npy,
}

impl ScanFormat {
    /// Recognise a scan file by its extension. Anything else isn't a scan.
    pub fn from_path(path: &Path) -> Option<ScanFormat> {
        match path.extension().and_then(|os_str| os_str.to_str()) {
            Some("npz") => Some(ScanFormat::Npz),
            Some("npy") => Some(ScanFormat::Npy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanFile {
    pub path: PathBuf,
    pub format: ScanFormat,
}

impl ScanFile {
    /// Read this scan's array.
    pub fn read(&self) -> Result<ArrayD<f64>, AggregateError> {
        trace!("Reading scan {}", self.path.display());
        match self.format {
            ScanFormat::Npz => npy::read_npz_first("Scan file", &self.path),
            ScanFormat::Npy => npy::read_npy_dyn("Scan file", &self.path),
        }
    }
}

/// One delay step's directory and its scans, in natural order.
#[derive(Debug, Clone)]
pub struct DelayDir {
    pub path: PathBuf,

    /// The scans taken at this delay. The position of a scan here is its scan
    /// index in the aggregated tensor.
    pub scans: Vec<ScanFile>,
}

/// The ordered structure of an experiment's raw data directory.
///
/// This is listed exactly once, and every later stage indexes into it, so the
/// delay and scan indices used to size the tensor are the same ones used to
/// fill it.
#[derive(Debug, Clone)]
pub struct ScanLayout {
    /// The raw data directory, `<base>/<experiment>/raw_data`.
    pub raw_data: PathBuf,

    /// The delay directories. The position of a delay here is its delay index
    /// in the aggregated tensor. Never empty.
    pub delays: Vec1<DelayDir>,
}

impl ScanLayout {
    /// Walk `raw_data`, collecting delay directories and their scan files.
    /// Entries that aren't directories (at the delay level) or scan files (at
    /// the scan level) are skipped.
    ///
    /// Every delay directory must hold the same number of scans as the first.
    pub fn discover(raw_data: &Path) -> Result<ScanLayout, AggregateError> {
        debug!("Using raw data directory: {}", raw_data.display());

        let mut delays = vec![];
        for delay_path in list_sorted(raw_data, "Raw data directory")? {
            if !delay_path.is_dir() {
                debug!("Skipping delay/folder or file {}.", file_name(&delay_path));
                continue;
            }

            let mut scans = vec![];
            for scan_path in list_sorted(&delay_path, "Delay directory")? {
                match ScanFormat::from_path(&scan_path) {
                    Some(format) if scan_path.is_file() => scans.push(ScanFile {
                        path: scan_path,
                        format,
                    }),
                    _ => debug!("Skipping array/folder or file {}.", scan_path.display()),
                }
            }
            delays.push(DelayDir {
                path: delay_path,
                scans,
            });
        }

        let delays = Vec1::try_from_vec(delays)
            .map_err(|_| AggregateError::not_found("Delay directories", raw_data))?;
        let first = delays.first();
        if first.scans.is_empty() {
            return Err(AggregateError::not_found("Scan files", &first.path));
        }
        let num_scans = first.scans.len();
        for delay in delays.iter().skip(1) {
            if delay.scans.len() != num_scans {
                return Err(AggregateError::inconsistent(
                    &delay.path,
                    format!(
                        "found {} scans, but {} has {num_scans}",
                        delay.scans.len(),
                        file_name(&first.path)
                    ),
                ));
            }
        }

        debug!("Number of delays: {}", delays.len());
        debug!("Number of scans:  {num_scans}");

        Ok(ScanLayout {
            raw_data: raw_data.to_path_buf(),
            delays,
        })
    }

    pub fn num_delays(&self) -> usize {
        self.delays.len()
    }

    /// The number of scans per delay. Uniform across delays by construction.
    pub fn num_scans(&self) -> usize {
        self.delays.first().scans.len()
    }

    /// The first scan of the first delay; its shape sets the tensor's shape.
    pub fn first_scan(&self) -> &ScanFile {
        // `discover` guarantees the first delay has scans.
        &self.delays.first().scans[0]
    }
}
