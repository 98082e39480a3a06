//! Error types for the build driver and transformers.

use std::path::PathBuf;

use kiln_config::ConfigError;
use kiln_source::ScanError;
use kiln_state::StateError;

/// Why a transformer invocation failed.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// A file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// An external command could not be run or exited unsuccessfully.
    #[error("command `{command}` failed: {reason}")]
    Command {
        /// The program that was run.
        command: String,
        /// What went wrong.
        reason: String,
    },

    /// An external command answered with something that is not a valid
    /// response.
    #[error("malformed transformer response: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The transformer ran and reported that compilation failed.
    #[error("{0}")]
    Reported(String),
}

/// Errors that end a build. None of them leave a new state file behind.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The source roots could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The state file could not be written.
    #[error(transparent)]
    State(#[from] StateError),

    /// The worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// A transformer does not handle the suffix it was registered for.
    #[error("{kind} transformer does not accept '{suffix}' sources")]
    Rejected {
        /// The suffix.
        suffix: String,
        /// Kind of the transformer.
        kind: String,
    },

    /// A transformer failed; the build stops and the previous state is kept.
    #[error("round {round}: {kind} transformer for '{suffix}' failed: {source}")]
    Transform {
        /// The round that failed.
        round: usize,
        /// The suffix group being compiled.
        suffix: String,
        /// Kind of the transformer.
        kind: String,
        /// The failure.
        source: TransformError,
    },

    /// A transformer claimed an artifact that is not on disk.
    #[error("artifact {} of {package} was reported but not written", path.display())]
    MissingArtifact {
        /// The owning package.
        package: String,
        /// The claimed file.
        path: PathBuf,
    },
}
