//! Loading and saving the state file.
//!
//! Loading is fail-safe: a missing, unreadable, outdated, or malformed file,
//! or one recorded for different build arguments, yields an empty state and
//! a [`DiscardReason`], which means "treat this as a first build". Saving is
//! atomic: the new state is fully written to a temporary file in the state
//! directory and only then moved over the previous file.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use kiln_common::{to_millis, Millis};
use tracing::info;

use crate::codec::{parse_state, render_state, ParseError};
use crate::error::StateError;
use crate::model::BuildState;

/// Name of the state file within the state directory.
pub const STATE_FILE: &str = ".kiln_state";

/// Why a previous state was not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// No state file exists yet.
    Missing,
    /// The file could not be read.
    Unreadable(String),
    /// The file was written by another format version.
    VersionMismatch {
        /// Version found in the file.
        found: String,
    },
    /// The file was recorded for different build arguments.
    ArgsChanged,
    /// The file is malformed.
    Syntax(String),
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no previous build state found"),
            Self::Unreadable(e) => write!(f, "could not read previous build state: {e}"),
            Self::VersionMismatch { found } => {
                write!(f, "previous build state has version {found}")
            }
            Self::ArgsChanged => write!(f, "build arguments changed since the previous build"),
            Self::Syntax(e) => write!(f, "previous build state is corrupt: {e}"),
        }
    }
}

/// Result of [`StateStore::load`].
#[derive(Debug)]
pub struct LoadOutcome {
    /// The loaded state, or an empty one if the file was discarded.
    pub state: BuildState,
    /// Set when the previous state could not be used.
    pub discarded: Option<DiscardReason>,
}

impl LoadOutcome {
    /// Returns `true` if the build starts from scratch.
    pub fn is_fresh(&self) -> bool {
        self.discarded.is_some()
    }
}

/// Reads and writes the state file of one output directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Creates a store for state kept in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The full path of the state file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Loads the previous state recorded for `args`.
    ///
    /// Never fails. When the file cannot be used, the reason is logged once
    /// and returned alongside a fresh state carrying `args`.
    pub fn load(&self, args: &str) -> LoadOutcome {
        let path = self.path();
        let discarded = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DiscardReason::Missing,
            Err(e) => DiscardReason::Unreadable(e.to_string()),
            Ok(text) => match parse_state(&text) {
                Ok(state) if state.args() == args => {
                    return LoadOutcome {
                        state,
                        discarded: None,
                    };
                }
                Ok(_) => DiscardReason::ArgsChanged,
                Err(ParseError::VersionMismatch { found, .. }) => {
                    DiscardReason::VersionMismatch { found }
                }
                Err(e) => DiscardReason::Syntax(e.to_string()),
            },
        };

        info!("{discarded}, building from scratch");
        LoadOutcome {
            state: BuildState::new(args),
            discarded: Some(discarded),
        }
    }

    /// Writes `state`, stamping the header with the current time.
    pub fn save(&self, state: &BuildState) -> Result<(), StateError> {
        self.save_at(state, to_millis(std::time::SystemTime::now()))
    }

    /// Writes `state` with an explicit generation time.
    pub fn save_at(&self, state: &BuildState, generated: Millis) -> Result<(), StateError> {
        let io_err = |source: std::io::Error| StateError::Io {
            path: self.dir.clone(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        let text = render_state(state, generated);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(text.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;

        let path = self.path();
        tmp.persist(&path).map_err(|e| StateError::Persist {
            path,
            source: e.error,
        })?;
        Ok(())
    }
}
