//! Directory listings in a stable, numeric-aware order.

use std::{
    borrow::Cow,
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
};

use crate::AggregateError;

/// Compare two names so that embedded runs of digits compare by their numeric
/// value, e.g. "delay_2" < "delay_10". Everything else compares bytewise.
/// Equal numbers with different zero padding are ordered shortest first, so
/// the ordering stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.as_bytes();
    let mut b = b.as_bytes();
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (digits_a, rest_a) = split_digits(a);
                let (digits_b, rest_b) = split_digits(b);
                let value_a = trim_zeros(digits_a);
                let value_b = trim_zeros(digits_b);
                let ord = value_a
                    .len()
                    .cmp(&value_b.len())
                    .then_with(|| value_a.cmp(value_b))
                    .then_with(|| digits_a.len().cmp(&digits_b.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let n = s.iter().take_while(|c| c.is_ascii_digit()).count();
    s.split_at(n)
}

fn trim_zeros(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|&&c| c == b'0').count();
    &s[n..]
}

pub(crate) fn file_name(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
}

/// List the entries of `dir`, sorted with [`natural_cmp`] on their file names.
/// Whatever order the filesystem hands back is discarded.
pub(crate) fn list_sorted(dir: &Path, what: &str) -> Result<Vec<PathBuf>, AggregateError> {
    let read_dir = fs::read_dir(dir).map_err(|e| AggregateError::io(what, dir, e))?;
    let mut paths = vec![];
    for entry in read_dir {
        let entry = entry.map_err(|e| AggregateError::io(what, dir, e))?;
        paths.push(entry.path());
    }
    paths.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(paths)
}
