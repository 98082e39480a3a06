//! Error types for state persistence.

use std::path::PathBuf;

/// Errors that can occur while writing build state.
///
/// Loading never fails: every problem reading a previous state degrades to
/// a from-scratch build (see [`DiscardReason`](crate::DiscardReason)). Only
/// saving reports errors, since a half-written state file would corrupt the
/// next incremental build.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// An I/O error occurred while writing the state file.
    #[error("state I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The fully written temporary file could not replace the previous state.
    #[error("failed to replace state file {path}: {source}")]
    Persist {
        /// The state file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = StateError::Io {
            path: PathBuf::from("/tmp/out/.kiln_state"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("state I/O error"));
        assert!(msg.contains(".kiln_state"));
    }

    #[test]
    fn persist_error_display() {
        let err = StateError::Persist {
            path: PathBuf::from("out/.kiln_state"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("failed to replace state file"));
    }
}
