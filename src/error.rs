use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

/// Everything that can go wrong while resolving an experiment's configuration
/// or aggregating its raw scans.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("{what} not found: {}", path.display())]
    NotFound { what: String, path: PathBuf },

    #[error("Bad format in {context}: {msg}")]
    Format { context: String, msg: String },

    #[error("Inconsistent raw data layout in {}: {msg}", path.display())]
    InconsistentLayout { path: PathBuf, msg: String },

    #[error("Unsupported linearization curve type '{0}'")]
    UnsupportedCurveType(String),

    #[error("Unknown laboratory '{0}'; only 'i-lab' is supported")]
    UnknownLaboratory(String),

    #[error("Couldn't write {}: {msg}", path.display())]
    Write { path: PathBuf, msg: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AggregateError {
    pub(crate) fn not_found<S: Into<String>, P: Into<PathBuf>>(what: S, path: P) -> Self {
        AggregateError::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    pub(crate) fn format<C: Display, M: Display>(context: C, msg: M) -> Self {
        AggregateError::Format {
            context: context.to_string(),
            msg: msg.to_string(),
        }
    }

    pub(crate) fn inconsistent<P: Into<PathBuf>, S: Into<String>>(path: P, msg: S) -> Self {
        AggregateError::InconsistentLayout {
            path: path.into(),
            msg: msg.into(),
        }
    }

    /// Map an IO error on `path`, turning a missing file or directory into
    /// [`AggregateError::NotFound`].
    pub(crate) fn io<S: Into<String>, P: Into<PathBuf>>(
        what: S,
        path: P,
        source: std::io::Error,
    ) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => AggregateError::not_found(what, path),
            _ => AggregateError::Io {
                path: path.into(),
                source,
            },
        }
    }
}
