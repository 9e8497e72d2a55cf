//! Persisting aggregated data.

use std::{
    io::{BufWriter, Write},
    path::Path,
};

use log::info;
use ndarray::{ArrayBase, Data, Dimension};
use ndarray_npy::WriteNpyExt;
use tempfile::NamedTempFile;

use crate::AggregateError;

/// Write `data` to `path` as a `.npy` file, replacing anything already there.
///
/// The array is written to a temporary file next to `path` which is then
/// renamed into place, so a failed write never leaves a partial file at
/// `path`.
pub fn write_npy_atomic<S, D>(path: &Path, data: &ArrayBase<S, D>) -> Result<(), AggregateError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    info!("Saving loaded data to {}.", path.display());
    let write_err = |msg: String| AggregateError::Write {
        path: path.to_path_buf(),
        msg,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AggregateError::io("Output directory", dir, e),
        _ => write_err(e.to_string()),
    })?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        data.write_npy(&mut writer)
            .map_err(|e| write_err(e.to_string()))?;
        writer.flush().map_err(|e| write_err(e.to_string()))?;
    }
    tmp.persist(path)
        .map_err(|e| write_err(e.error.to_string()))?;
    Ok(())
}
