//! The dependency-graph model shared by the "prev" and "now" snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use kiln_common::{Millis, PackageName};
use kiln_source::{Source, SourceTree, UNNAMED_MODULE};

use crate::api::PublicApi;

/// An output file produced for a package.
///
/// The recorded timestamp is compared against the file on disk to detect
/// outputs that were deleted or replaced behind the coordinator's back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Logical artifact name (e.g. `a/b/C.class`), unique within a package.
    pub name: String,
    /// Path of the output file.
    pub file: String,
    /// Last-modified time of the file when it was recorded.
    pub timestamp: Millis,
}

impl Artifact {
    /// Creates an artifact record.
    pub fn new(name: impl Into<String>, file: impl Into<String>, timestamp: Millis) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            timestamp,
        }
    }

    /// The output file location.
    pub fn path(&self) -> &Path {
        Path::new(&self.file)
    }
}

/// A named grouping of sources; the unit of taint and recompilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    name: PackageName,
    dependencies: BTreeSet<PackageName>,
    api: PublicApi,
    artifacts: BTreeMap<String, Artifact>,
    sources: BTreeMap<String, Source>,
}

impl Package {
    /// Creates an empty package.
    pub fn new(name: PackageName) -> Self {
        Self {
            name,
            dependencies: BTreeSet::new(),
            api: PublicApi::default(),
            artifacts: BTreeMap::new(),
            sources: BTreeMap::new(),
        }
    }

    /// The module-qualified name.
    pub fn name(&self) -> &PackageName {
        &self.name
    }

    /// Names of packages this package references.
    pub fn dependencies(&self) -> &BTreeSet<PackageName> {
        &self.dependencies
    }

    /// The public-API fingerprint.
    pub fn api(&self) -> &PublicApi {
        &self.api
    }

    /// Artifacts by logical name.
    pub fn artifacts(&self) -> &BTreeMap<String, Artifact> {
        &self.artifacts
    }

    /// Sources by logical name.
    pub fn sources(&self) -> &BTreeMap<String, Source> {
        &self.sources
    }

    /// Records a dependency. Self-references are ignored.
    pub fn add_dependency(&mut self, dep: PackageName) {
        if dep != self.name {
            self.dependencies.insert(dep);
        }
    }

    /// Replaces the dependency set.
    pub fn set_dependencies(&mut self, deps: impl IntoIterator<Item = PackageName>) {
        self.dependencies.clear();
        for dep in deps {
            self.add_dependency(dep);
        }
    }

    /// Replaces the public-API fingerprint.
    pub fn set_api(&mut self, api: PublicApi) {
        self.api = api;
    }

    /// Appends one signature line to the public-API fingerprint.
    pub fn push_api_line(&mut self, line: impl Into<String>) {
        self.api.push(line);
    }

    /// Records an artifact, replacing one with the same name.
    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.name.clone(), artifact);
    }

    /// Replaces the artifact map.
    pub fn set_artifacts(&mut self, artifacts: impl IntoIterator<Item = Artifact>) {
        self.artifacts = artifacts
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();
    }

    /// Records a source.
    pub fn add_source(&mut self, source: Source) {
        self.sources.insert(source.name().to_string(), source);
    }

    /// Copies dependencies, API, and artifacts from another snapshot's
    /// version of this package, keeping this package's sources.
    pub fn inherit_compiled_facts(&mut self, other: &Package) {
        self.dependencies = other.dependencies.clone();
        self.api = other.api.clone();
        self.artifacts = other.artifacts.clone();
    }
}

/// A named grouping of packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module name, empty for the unnamed module.
    pub name: String,
    /// Path of the module descriptor, if the module declared one.
    pub descriptor: Option<String>,
}

impl Module {
    /// Creates a module record.
    pub fn new(name: impl Into<String>, descriptor: Option<String>) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

/// A complete view of modules, packages, sources, and artifacts.
///
/// Packages are keyed by module-qualified name so that the "prev" and "now"
/// snapshots can be compared directly. The dependents index is derived from
/// the dependency edges and rebuilt wholesale by
/// [`recompute_dependents`](Self::recompute_dependents); it is never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildState {
    args: String,
    modules: BTreeMap<String, Module>,
    packages: BTreeMap<PackageName, Package>,
    dependents: BTreeMap<PackageName, BTreeSet<PackageName>>,
}

impl BuildState {
    /// Creates an empty state recording the given command-line fingerprint.
    pub fn new(args: impl Into<String>) -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(
            UNNAMED_MODULE.to_string(),
            Module::new(UNNAMED_MODULE, None),
        );
        Self {
            args: args.into(),
            modules,
            packages: BTreeMap::new(),
            dependents: BTreeMap::new(),
        }
    }

    /// Builds the "now" snapshot from a fresh scan: every module and every
    /// package with its sources, but no compiled facts yet.
    pub fn from_tree(tree: &SourceTree, args: impl Into<String>) -> Self {
        let mut state = Self::new(args);
        for info in tree.modules.values() {
            state.ensure_module(&info.name, info.descriptor.clone());
        }
        for source in tree.sources.values() {
            state.package_entry(source.package()).add_source(source.clone());
        }
        state.recompute_dependents();
        state
    }

    /// Replaces the command-line fingerprint.
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    /// The command-line fingerprint this state was built with.
    pub fn args(&self) -> &str {
        &self.args
    }

    /// Modules by name.
    pub fn modules(&self) -> &BTreeMap<String, Module> {
        &self.modules
    }

    /// Packages by qualified name.
    pub fn packages(&self) -> &BTreeMap<PackageName, Package> {
        &self.packages
    }

    /// Looks up a package.
    pub fn package(&self, name: &PackageName) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Looks up a package for modification.
    pub fn package_mut(&mut self, name: &PackageName) -> Option<&mut Package> {
        self.packages.get_mut(name)
    }

    /// Returns the package with the given name, creating it (and its
    /// module) if needed.
    pub fn package_entry(&mut self, name: &PackageName) -> &mut Package {
        if !self.modules.contains_key(name.module()) {
            self.ensure_module(name.module(), None);
        }
        self.packages
            .entry(name.clone())
            .or_insert_with(|| Package::new(name.clone()))
    }

    /// Registers a module. An existing descriptor is kept unless a new one
    /// is supplied.
    pub fn ensure_module(&mut self, name: &str, descriptor: Option<String>) {
        let module = self
            .modules
            .entry(name.to_string())
            .or_insert_with(|| Module::new(name, None));
        if descriptor.is_some() {
            module.descriptor = descriptor;
        }
    }

    /// Packages belonging to a module, in name order.
    pub fn packages_in<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a Package> + 'a {
        self.packages
            .values()
            .filter(move |p| p.name().module() == module)
    }

    /// Every source of every package.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.packages.values().flat_map(|p| p.sources().values())
    }

    /// Every source, keyed by logical name.
    pub fn source_map(&self) -> BTreeMap<&str, &Source> {
        self.sources().map(|s| (s.name(), s)).collect()
    }

    /// Every artifact with its owning package.
    pub fn artifacts(&self) -> impl Iterator<Item = (&PackageName, &Artifact)> {
        self.packages
            .values()
            .flat_map(|p| p.artifacts().values().map(move |a| (p.name(), a)))
    }

    /// Packages that currently list `name` as a dependency.
    pub fn dependents(&self, name: &PackageName) -> impl Iterator<Item = &PackageName> {
        self.dependents.get(name).into_iter().flatten()
    }

    /// Rebuilds the dependents index from the dependency edges.
    pub fn recompute_dependents(&mut self) {
        let mut index: BTreeMap<PackageName, BTreeSet<PackageName>> = BTreeMap::new();
        for package in self.packages.values() {
            for dep in package.dependencies() {
                index
                    .entry(dep.clone())
                    .or_default()
                    .insert(package.name().clone());
            }
        }
        self.dependents = index;
    }

    /// Returns `true` if the state records no packages at all.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
