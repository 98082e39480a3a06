//! Resolution of file configuration and command-line overrides into the
//! validated options a build runs with.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use kiln_source::{RootKind, SourceRoot};
use tracing::debug;

use crate::error::ConfigError;
use crate::types::{KilnConfig, TransformerSpec};

/// Values given on the command line. Paths are used as given; set fields
/// replace the corresponding file values.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces `build.roots` when non-empty.
    pub roots: Vec<PathBuf>,
    /// Replaces `build.link_roots` when non-empty.
    pub link_roots: Vec<PathBuf>,
    /// Replaces `build.output`.
    pub output: Option<PathBuf>,
    /// Replaces `build.state_dir`.
    pub state_dir: Option<PathBuf>,
    /// Replaces `build.cores`.
    pub cores: Option<usize>,
    /// Enables `build.permit_unidentified_artifacts`.
    pub permit_unidentified_artifacts: bool,
    /// File listing the sources the scan is expected to find.
    pub compare_found_sources: Option<PathBuf>,
}

/// Fully resolved and validated build options.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Source roots in scan order: compiled, generated, then link-only.
    pub roots: Vec<SourceRoot>,
    /// The artifact output root.
    pub output: PathBuf,
    /// Optional header output root.
    pub headers: Option<PathBuf>,
    /// Directory holding the state file.
    pub state_dir: PathBuf,
    /// Worker pool bound.
    pub cores: usize,
    /// Keep unclaimed files in output roots.
    pub permit_unidentified_artifacts: bool,
    /// Module declaration file name.
    pub module_descriptor: String,
    /// Extra arguments for every transformer.
    pub compiler_args: Vec<String>,
    /// Transformers by suffix.
    pub transformers: BTreeMap<String, TransformerSpec>,
    /// Expected source list to check the scan against.
    pub compare_found_sources: Option<PathBuf>,
}

impl BuildOptions {
    /// Merges `config` (whose relative paths are resolved against `base`)
    /// with `overrides` and validates the result against the file system.
    pub fn resolve(
        config: KilnConfig,
        base: &Path,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let build = config.build;
        let from_file = |paths: &[String]| -> Vec<PathBuf> {
            paths.iter().map(|p| base.join(p)).collect()
        };

        let compiled = if overrides.roots.is_empty() {
            from_file(&build.roots)
        } else {
            overrides.roots
        };
        let link_only = if overrides.link_roots.is_empty() {
            from_file(&build.link_roots)
        } else {
            overrides.link_roots
        };
        let generated = from_file(&build.generated_roots);

        let roots: Vec<SourceRoot> = compiled
            .into_iter()
            .map(|p| SourceRoot::new(p, RootKind::Compiled))
            .chain(generated.into_iter().map(|p| SourceRoot::new(p, RootKind::Generated)))
            .chain(link_only.into_iter().map(|p| SourceRoot::new(p, RootKind::LinkOnly)))
            .collect();
        if !roots.iter().any(|r| r.kind != RootKind::LinkOnly) {
            return Err(ConfigError::MissingField("build.roots".to_string()));
        }

        let output = match overrides.output {
            Some(output) => output,
            None => build
                .output
                .as_deref()
                .map(|o| base.join(o))
                .ok_or_else(|| ConfigError::MissingField("build.output".to_string()))?,
        };
        let headers = build.headers.as_deref().map(|h| base.join(h));
        let state_dir = overrides
            .state_dir
            .or_else(|| build.state_dir.as_deref().map(|s| base.join(s)))
            .unwrap_or_else(|| output.clone());

        if config.transformers.is_empty() {
            return Err(ConfigError::NoTransformers);
        }

        let cores = overrides
            .cores
            .or(build.cores)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1);

        let options = Self {
            roots,
            output,
            headers,
            state_dir,
            cores,
            permit_unidentified_artifacts: overrides.permit_unidentified_artifacts
                || build.permit_unidentified_artifacts,
            module_descriptor: build.module_descriptor,
            compiler_args: build.compiler_args,
            transformers: config.transformers,
            compare_found_sources: overrides.compare_found_sources,
        };
        options.validate()?;
        debug!(args = %options.state_args(), cores = options.cores, "resolved build options");
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for root in &self.roots {
            if !root.path.exists() {
                return Err(ConfigError::InvalidRoot {
                    path: root.path.clone(),
                    reason: "does not exist",
                });
            }
            if !root.path.is_dir() {
                return Err(ConfigError::InvalidRoot {
                    path: root.path.clone(),
                    reason: "is not a directory",
                });
            }
            let canonical = root.path.canonicalize().map_err(|_| ConfigError::InvalidRoot {
                path: root.path.clone(),
                reason: "cannot be resolved",
            })?;
            if !seen.insert(canonical) {
                return Err(ConfigError::DuplicateRoot {
                    path: root.path.clone(),
                });
            }
        }
        for output in self.output_roots() {
            let canonical = output.canonicalize().unwrap_or_else(|_| output.to_path_buf());
            if seen.contains(&canonical) {
                return Err(ConfigError::OutputIsSourceRoot {
                    path: output.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    /// Every directory artifacts are written to.
    pub fn output_roots(&self) -> Vec<&Path> {
        std::iter::once(self.output.as_path())
            .chain(self.headers.as_deref())
            .collect()
    }

    /// The suffixes that have a registered transformer.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.transformers.keys().map(String::as_str)
    }

    /// The normalized list of options that change what a build produces.
    ///
    /// A previous state recorded with different arguments is discarded.
    /// Worker count, cleanup policy, and the state location are left out
    /// because they do not change the outputs.
    pub fn state_args(&self) -> String {
        let mut parts = Vec::new();
        for root in &self.roots {
            let flag = match root.kind {
                RootKind::Compiled => "--root",
                RootKind::Generated => "--generated-root",
                RootKind::LinkOnly => "--link-root",
            };
            parts.push(format!("{flag} {}", slashed(&root.path)));
        }
        parts.push(format!("--output {}", slashed(&self.output)));
        if let Some(headers) = &self.headers {
            parts.push(format!("--headers {}", slashed(headers)));
        }
        parts.push(format!("--module-descriptor {}", self.module_descriptor));
        for (suffix, spec) in &self.transformers {
            match spec {
                TransformerSpec::Copy => parts.push(format!("--transformer {suffix}=copy")),
                TransformerSpec::Process { command } => parts.push(format!(
                    "--transformer {suffix}=process:{}",
                    command.join(" ")
                )),
            }
        }
        for arg in &self.compiler_args {
            parts.push(format!("--compiler-arg {arg}"));
        }
        parts.join(" ").replace(['\n', '\r'], " ")
    }

    /// Compares the compiled sources found by the scan with the list in
    /// [`compare_found_sources`](Self::compare_found_sources), if one was
    /// given. Entries must use the same form as the scanned names.
    pub fn check_found_sources<'a, I>(&self, found: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(list) = &self.compare_found_sources else {
            return Ok(());
        };
        let text = std::fs::read_to_string(list).map_err(|source| ConfigError::Io {
            path: list.clone(),
            source,
        })?;
        let expected: BTreeSet<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| l.replace('\\', "/"))
            .collect();
        let found: BTreeSet<String> = found.into_iter().map(str::to_string).collect();

        let missing: Vec<String> = expected.difference(&found).cloned().collect();
        let extra: Vec<String> = found.difference(&expected).cloned().collect();
        if missing.is_empty() && extra.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::SourceListMismatch { missing, extra })
        }
    }
}

fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
