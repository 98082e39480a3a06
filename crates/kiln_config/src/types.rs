//! Configuration types deserialized from `kiln.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Default name of the file that declares a module.
pub const DEFAULT_MODULE_DESCRIPTOR: &str = "module-info.java";

/// The top-level configuration parsed from `kiln.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KilnConfig {
    /// Roots, outputs, and build-wide settings.
    #[serde(default)]
    pub build: BuildSection,
    /// Transformers keyed by the file suffix they handle (`".java"`).
    #[serde(default)]
    pub transformers: BTreeMap<String, TransformerSpec>,
}

/// The `[build]` table. Paths are relative to the configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Compiled source roots.
    #[serde(default)]
    pub roots: Vec<String>,
    /// Roots whose sources are visible for resolution but never compiled.
    #[serde(default)]
    pub link_roots: Vec<String>,
    /// Compiled roots holding translator output.
    #[serde(default)]
    pub generated_roots: Vec<String>,
    /// The artifact output root.
    pub output: Option<String>,
    /// An optional second output root for generated headers.
    pub headers: Option<String>,
    /// Where the state file lives; defaults to the output root.
    pub state_dir: Option<String>,
    /// Bound on the worker pool; defaults to the available parallelism.
    pub cores: Option<usize>,
    /// Keep files in output roots that no package claims.
    #[serde(default)]
    pub permit_unidentified_artifacts: bool,
    /// File whose presence in a directory starts a new module.
    #[serde(default = "default_module_descriptor")]
    pub module_descriptor: String,
    /// Extra arguments handed to every transformer.
    #[serde(default)]
    pub compiler_args: Vec<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            link_roots: Vec::new(),
            generated_roots: Vec::new(),
            output: None,
            headers: None,
            state_dir: None,
            cores: None,
            permit_unidentified_artifacts: false,
            module_descriptor: default_module_descriptor(),
            compiler_args: Vec::new(),
        }
    }
}

fn default_module_descriptor() -> String {
    DEFAULT_MODULE_DESCRIPTOR.to_string()
}

/// How sources with a given suffix are turned into artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransformerSpec {
    /// Copy each source into the output root unchanged.
    Copy,
    /// Run an external command speaking the JSON transformer protocol.
    Process {
        /// Program followed by its arguments.
        command: Vec<String>,
    },
}

impl TransformerSpec {
    /// The `kind` name used in the configuration file.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Process { .. } => "process",
        }
    }
}
