//! Parsing and validation of `kiln.toml` build configuration files.
//!
//! This crate reads the configuration file into strongly-typed
//! [`KilnConfig`] values and resolves them, together with command-line
//! overrides, into the validated [`BuildOptions`] a build runs with.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod options;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use options::{BuildOptions, Overrides};
pub use types::*;
