//! Turns the configuration file and command-line flags into build options.

use std::path::{Path, PathBuf};

use kiln_config::{load_config, BuildOptions, ConfigError, Overrides, CONFIG_FILE};

use crate::{BuildArgs, GlobalArgs};

/// The configuration file to read: `--config`, or `kiln.toml` in the
/// current directory.
pub fn config_path(global: &GlobalArgs) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Maps command-line flags onto configuration overrides.
pub fn overrides(args: &BuildArgs) -> Overrides {
    Overrides {
        roots: args.roots.clone(),
        link_roots: args.link_roots.clone(),
        output: args.output.clone(),
        state_dir: args.state_dir.clone(),
        cores: args.cores.map(usize::from),
        permit_unidentified_artifacts: args.permit_unidentified_artifacts,
        compare_found_sources: args.compare_found_sources.clone(),
    }
}

/// Loads the configuration and resolves it against the flags. Paths in the
/// file are relative to the file's directory.
pub fn resolve(args: &BuildArgs, global: &GlobalArgs) -> Result<BuildOptions, ConfigError> {
    let path = config_path(global);
    let config = load_config(&path)?;
    let base = path.parent().unwrap_or(Path::new(""));
    BuildOptions::resolve(config, base, overrides(args))
}
