//! Helpers for reading numpy `.npy` and `.npz` files.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use log::{trace, warn};
use ndarray::{Array, ArrayD, Dimension};
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use zip::ZipArchive;

use crate::AggregateError;

/// Open a file, reporting a missing file as [`AggregateError::NotFound`] with
/// the description `what`.
pub(crate) fn open_file(what: &str, path: &Path) -> Result<File, AggregateError> {
    File::open(path).map_err(|e| AggregateError::io(what, path, e))
}

/// Decode the bytes of a `.npy` file holding any numeric element type,
/// converting every element to `f64`.
fn decode_npy_as_f64(bytes: &[u8], context: &str) -> Result<ArrayD<f64>, AggregateError> {
    macro_rules! try_element_types {
        ($($t:ty),*) => {
            $(
                match ArrayD::<$t>::read_npy(bytes) {
                    Ok(array) => return Ok(array.mapv(|v| v as f64)),
                    Err(ReadNpyError::WrongDescriptor(_)) => (),
                    Err(e) => return Err(AggregateError::format(context, e)),
                }
            )*
        };
    }
    try_element_types!(f64, f32, i8, i16, i32, i64, u8, u16, u32, u64);

    Err(AggregateError::format(
        context,
        "array element type isn't a supported numeric type",
    ))
}

/// Read a `.npy` file of any dimensionality and numeric element type.
pub(crate) fn read_npy_dyn(what: &str, path: &Path) -> Result<ArrayD<f64>, AggregateError> {
    let mut bytes = vec![];
    BufReader::new(open_file(what, path)?)
        .read_to_end(&mut bytes)
        .map_err(|e| AggregateError::io(what, path, e))?;
    decode_npy_as_f64(&bytes, &path.display().to_string())
}

/// Read a `.npy` file, insisting on the dimensionality `D`.
pub(crate) fn read_npy<D: Dimension>(
    what: &str,
    path: &Path,
) -> Result<Array<f64, D>, AggregateError> {
    let array = read_npy_dyn(what, path)?;
    let shape = array.shape().to_vec();
    array.into_dimensionality::<D>().map_err(|_| {
        AggregateError::format(
            path.display(),
            format!(
                "expected a {}-D array, got shape {shape:?}",
                D::NDIM.unwrap_or(0)
            ),
        )
    })
}

/// Read the first array stored in a `.npz` archive. Raw scan archives are
/// expected to hold exactly one array; any others are ignored.
pub(crate) fn read_npz_first(what: &str, path: &Path) -> Result<ArrayD<f64>, AggregateError> {
    let file = open_file(what, path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| AggregateError::format(path.display(), e))?;
    let num_arrays = archive.len();
    if num_arrays == 0 {
        return Err(AggregateError::format(
            path.display(),
            "archive contains no arrays",
        ));
    }

    let mut entry = archive
        .by_index(0)
        .map_err(|e| AggregateError::format(path.display(), e))?;
    let name = entry.name().to_string();
    if num_arrays == 1 {
        trace!("Reading array '{name}' from {}", path.display());
    } else {
        warn!(
            "{} holds {num_arrays} arrays; only reading '{name}'",
            path.display()
        );
    }
    let mut bytes = vec![];
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| AggregateError::format(path.display(), e))?;
    decode_npy_as_f64(&bytes, &format!("'{name}' in {}", path.display()))
}
