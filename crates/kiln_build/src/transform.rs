//! The transformer seam: the capability trait external compilers implement,
//! the suffix registry, and the concurrent sink results are collected in.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use kiln_common::PackageName;
use kiln_config::{BuildOptions, TransformerSpec};
use kiln_source::Source;
use kiln_state::{BuildState, PublicApi};

use crate::copy::CopyTransformer;
use crate::error::{BuildError, TransformError};
use crate::process::ProcessTransformer;

/// Everything a transformer gets to see for one invocation.
pub struct TransformRequest<'a> {
    /// Sources to compile, grouped by package.
    pub packages: BTreeMap<PackageName, Vec<&'a Source>>,
    /// Sources visible for resolution only.
    pub link_only: Vec<&'a Source>,
    /// The previous build's graph, for dependency information.
    pub prev: &'a BuildState,
    /// The artifact output root.
    pub output: &'a Path,
    /// The header output root, if one is configured.
    pub headers: Option<&'a Path>,
    /// Extra arguments from the configuration.
    pub args: &'a [String],
    /// The bounded worker pool to run parallel work on.
    pub pool: &'a rayon::ThreadPool,
}

impl TransformRequest<'_> {
    /// Total number of sources to compile.
    pub fn source_count(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }
}

/// What one package produced in a round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledPackage {
    /// Artifact files by logical name.
    pub artifacts: BTreeMap<String, PathBuf>,
    /// Packages referenced by the compiled sources.
    pub dependencies: BTreeSet<PackageName>,
    /// The public-API fingerprint.
    pub api: PublicApi,
}

/// Collects per-package results while transformers run in parallel.
///
/// Each key is written by the worker that compiled that package. When a
/// package has sources for several transformers, their results are merged
/// in suffix order.
#[derive(Debug, Default)]
pub struct TransformSink {
    artifacts: DashMap<PackageName, BTreeMap<String, PathBuf>>,
    dependencies: DashMap<PackageName, BTreeSet<PackageName>>,
    apis: DashMap<PackageName, Vec<String>>,
}

impl TransformSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `package` was compiled, even if it produced nothing.
    pub fn mark_compiled(&self, package: &PackageName) {
        self.artifacts.entry(package.clone()).or_default();
    }

    /// Records an artifact of `package`.
    pub fn add_artifact(&self, package: &PackageName, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.artifacts
            .entry(package.clone())
            .or_default()
            .insert(name.into(), path.into());
    }

    /// Records that `package` references `dependency`.
    pub fn add_dependency(&self, package: &PackageName, dependency: PackageName) {
        self.dependencies
            .entry(package.clone())
            .or_default()
            .insert(dependency);
    }

    /// Appends a serialized fingerprint (one signature per line) to
    /// `package`'s public API.
    pub fn add_api(&self, package: &PackageName, serialized: &str) {
        self.apis
            .entry(package.clone())
            .or_default()
            .extend(serialized.lines().filter(|l| !l.is_empty()).map(str::to_string));
    }

    /// Number of packages with any recorded result.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> BTreeSet<PackageName> {
        self.artifacts
            .iter()
            .map(|e| e.key().clone())
            .chain(self.dependencies.iter().map(|e| e.key().clone()))
            .chain(self.apis.iter().map(|e| e.key().clone()))
            .collect()
    }

    /// Consumes the sink once the parallel phase has finished.
    pub fn into_results(self) -> BTreeMap<PackageName, CompiledPackage> {
        let keys = self.keys();
        keys.into_iter()
            .map(|name| {
                let compiled = CompiledPackage {
                    artifacts: self.artifacts.remove(&name).map(|(_, v)| v).unwrap_or_default(),
                    dependencies: self
                        .dependencies
                        .remove(&name)
                        .map(|(_, v)| v)
                        .unwrap_or_default(),
                    api: PublicApi::new(self.apis.remove(&name).map(|(_, v)| v).unwrap_or_default()),
                };
                (name, compiled)
            })
            .collect()
    }
}

/// A compiler, translator, or copier for sources with certain suffixes.
pub trait Transformer: Send + Sync {
    /// Short name of this kind of transformer, for logs.
    fn kind(&self) -> &'static str;

    /// Whether this transformer can handle sources with `suffix`.
    fn accepts(&self, suffix: &str) -> bool;

    /// Processes every package in `request`, recording results in `sink`.
    ///
    /// Returning an error fails the whole build.
    fn transform(&self, request: &TransformRequest<'_>, sink: &TransformSink) -> Result<(), TransformError>;
}

/// Maps file suffixes to the transformer that handles them.
///
/// Resolved once from configuration; the driver only looks suffixes up.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    by_suffix: BTreeMap<String, Arc<dyn Transformer>>,
}

impl TransformerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry described by the `[transformers]` table.
    pub fn from_options(options: &BuildOptions) -> Result<Self, BuildError> {
        let mut registry = Self::new();
        for (suffix, spec) in &options.transformers {
            let transformer: Arc<dyn Transformer> = match spec {
                TransformerSpec::Copy => Arc::new(CopyTransformer::new()),
                TransformerSpec::Process { command } => Arc::new(ProcessTransformer::new(command.clone())),
            };
            registry.register(suffix, transformer)?;
        }
        Ok(registry)
    }

    /// Registers `transformer` for `suffix`, replacing any earlier one.
    pub fn register(&mut self, suffix: &str, transformer: Arc<dyn Transformer>) -> Result<(), BuildError> {
        if !transformer.accepts(suffix) {
            return Err(BuildError::Rejected {
                suffix: suffix.to_string(),
                kind: transformer.kind().to_string(),
            });
        }
        self.by_suffix.insert(suffix.to_string(), transformer);
        Ok(())
    }

    /// The transformer for `suffix`.
    pub fn get(&self, suffix: &str) -> Option<&Arc<dyn Transformer>> {
        self.by_suffix.get(suffix)
    }

    /// Registered suffixes in order.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.by_suffix.keys().map(String::as_str)
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_suffix.is_empty()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.by_suffix.iter().map(|(s, t)| (s, t.kind())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct JavaOnly;

    impl Transformer for JavaOnly {
        fn kind(&self) -> &'static str {
            "java-only"
        }

        fn accepts(&self, suffix: &str) -> bool {
            suffix == ".java"
        }

        fn transform(&self, _: &TransformRequest<'_>, _: &TransformSink) -> Result<(), TransformError> {
            Ok(())
        }
    }

    fn name(p: &str) -> PackageName {
        PackageName::new("", p)
    }

    #[test]
    fn sink_merges_per_package() {
        let sink = TransformSink::new();
        sink.add_artifact(&name("a"), "a/A.class", "out/a/A.class");
        sink.add_dependency(&name("a"), name("b"));
        sink.add_api(&name("a"), "class A\n\nvoid f()");
        sink.add_api(&name("a"), "int X");
        sink.mark_compiled(&name("c"));

        let results = sink.into_results();
        assert_eq!(results.len(), 2);
        let a = &results[&name("a")];
        assert_eq!(a.artifacts["a/A.class"], PathBuf::from("out/a/A.class"));
        assert!(a.dependencies.contains(&name("b")));
        assert_eq!(a.api.lines(), ["class A", "void f()", "int X"]);
        assert_eq!(results[&name("c")], CompiledPackage::default());
    }

    #[test]
    fn sink_accepts_concurrent_writers() {
        let sink = TransformSink::new();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        pool.scope(|s| {
            for i in 0..32 {
                let sink = &sink;
                s.spawn(move |_| {
                    let pkg = name(&format!("p{i}"));
                    sink.add_artifact(&pkg, "X.class", format!("out/p{i}/X.class"));
                });
            }
        });
        assert_eq!(sink.len(), 32);
    }

    #[test]
    fn registry_rejects_unaccepted_suffix() {
        let mut registry = TransformerRegistry::new();
        registry.register(".java", Arc::new(JavaOnly)).unwrap();
        let err = registry.register(".kt", Arc::new(JavaOnly)).unwrap_err();
        assert!(matches!(err, BuildError::Rejected { .. }));
        assert_eq!(registry.suffixes().collect::<Vec<_>>(), vec![".java"]);
        assert_eq!(registry.get(".java").unwrap().kind(), "java-only");
        assert!(registry.get(".kt").is_none());
    }
}
