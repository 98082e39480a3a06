//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{KilnConfig, TransformerSpec};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration file.
pub fn load_config(path: &Path) -> Result<KilnConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Only checks that need no file system access happen here; roots and
/// outputs are checked when the configuration is resolved.
pub fn load_config_from_str(content: &str) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &KilnConfig) -> Result<(), ConfigError> {
    for (suffix, spec) in &config.transformers {
        if !suffix.starts_with('.') || suffix.len() < 2 {
            return Err(ConfigError::InvalidTransformer {
                suffix: suffix.clone(),
                reason: "suffix must start with '.'",
            });
        }
        if let TransformerSpec::Process { command } = spec {
            if command.first().map_or(true, |c| c.is_empty()) {
                return Err(ConfigError::InvalidTransformer {
                    suffix: suffix.clone(),
                    reason: "process command is empty",
                });
            }
        }
    }
    if config.build.module_descriptor.is_empty() {
        return Err(ConfigError::MissingField("build.module_descriptor".to_string()));
    }
    if config.build.cores == Some(0) {
        return Err(ConfigError::Parse("build.cores must be at least 1".to_string()));
    }
    Ok(())
}
