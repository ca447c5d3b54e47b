//! Error types for statemigrate-vars.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VarsError {
    /// A sensitive variable's category is neither `env` nor `terraform`.
    #[error("sensitive variable {key} in group {group} has category '{category}'; expected 'env' or 'terraform'")]
    InvalidCategory {
        group: String,
        key: String,
        category: String,
    },

    /// The variables file could not be written.
    #[error("cannot write variables file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`VarsError::FileWrite`].
pub(crate) fn write_err(path: impl Into<PathBuf>, source: std::io::Error) -> VarsError {
    VarsError::FileWrite {
        path: path.into(),
        source,
    }
}
