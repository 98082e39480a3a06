//! Error types for source-tree scanning.

use std::path::PathBuf;

/// Errors that can occur while scanning source roots.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// A directory or file could not be read.
    #[error("failed to scan {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Two directories declare a module with the same name.
    #[error("module '{name}' is declared twice: in {first} and {second}")]
    DuplicateModule {
        /// The module name.
        name: String,
        /// Directory of the first declaration.
        first: PathBuf,
        /// Directory of the second declaration.
        second: PathBuf,
    },

    /// The same compilation unit appears in two compiled roots.
    #[error("{unit} is found in more than one source root: {first} and {second}")]
    DuplicateSource {
        /// Package-qualified unit name.
        unit: String,
        /// The first occurrence.
        first: String,
        /// The second occurrence.
        second: String,
    },
}
