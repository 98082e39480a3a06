//! Source-tree scanning.
//!
//! Walks every configured root, creating a new module context whenever a
//! directory holds a module descriptor, and builds one [`Source`] per file
//! whose suffix has a registered transformer.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use kiln_common::{modified_millis, PackageName};
use tracing::debug;

use crate::error::ScanError;
use crate::source::{suffix_of, Source};

/// Name of the legacy unnamed module, which always exists.
pub const UNNAMED_MODULE: &str = "";

/// How the sources under a root take part in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RootKind {
    /// Hand-written sources that are compiled.
    Compiled,
    /// Translator output that is compiled; sources are flagged generated.
    Generated,
    /// Sources visible for resolution but never compiled.
    LinkOnly,
}

/// A directory to scan and the role of its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    /// The root directory.
    pub path: PathBuf,
    /// Role of every source found under it.
    pub kind: RootKind,
}

impl SourceRoot {
    /// Creates a root of the given kind.
    pub fn new(path: impl Into<PathBuf>, kind: RootKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A module discovered while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module name, empty for the unnamed module.
    pub name: String,
    /// Path of the descriptor file that introduced the module.
    pub descriptor: Option<String>,
}

impl ModuleInfo {
    /// The legacy unnamed module.
    pub fn unnamed() -> Self {
        Self {
            name: UNNAMED_MODULE.to_string(),
            descriptor: None,
        }
    }
}

/// Everything found by one scan.
#[derive(Debug, Clone)]
pub struct SourceTree {
    /// Modules by name; always contains the unnamed module.
    pub modules: BTreeMap<String, ModuleInfo>,
    /// Sources by logical name.
    pub sources: BTreeMap<String, Source>,
}

impl SourceTree {
    /// Creates a tree holding only the unnamed module.
    pub fn new() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(UNNAMED_MODULE.to_string(), ModuleInfo::unnamed());
        Self {
            modules,
            sources: BTreeMap::new(),
        }
    }

    /// Sources that will be compiled (everything but link-only).
    pub fn compiled(&self) -> impl Iterator<Item = &Source> {
        self.sources.values().filter(|s| !s.is_link_only())
    }

    /// Number of sources found.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no sources were found.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks source roots and classifies the files found.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    suffixes: BTreeSet<String>,
    module_descriptor: String,
}

/// Where a directory's packages are rooted while walking.
struct ModuleContext<'a> {
    name: String,
    base: &'a Path,
}

impl SourceScanner {
    /// Creates a scanner accepting files with the given suffixes (`.java`)
    /// and treating `module_descriptor` as the module declaration file.
    pub fn new<I, S>(suffixes: I, module_descriptor: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
            module_descriptor: module_descriptor.into(),
        }
    }

    /// Scans all roots in order.
    ///
    /// The same unit (package + file name) in two compiled roots is an error.
    /// A link-only unit is shadowed by a compiled one regardless of root order.
    pub fn scan(&self, roots: &[SourceRoot]) -> Result<SourceTree, ScanError> {
        let mut tree = SourceTree::new();
        let mut units: HashMap<String, (String, RootKind)> = HashMap::new();
        let mut module_dirs: HashMap<String, PathBuf> = HashMap::new();

        for root in roots {
            let ctx = ModuleContext {
                name: UNNAMED_MODULE.to_string(),
                base: &root.path,
            };
            self.walk(
                &root.path,
                root.kind,
                &ctx,
                &mut tree,
                &mut units,
                &mut module_dirs,
            )?;
        }

        debug!(
            sources = tree.sources.len(),
            modules = tree.modules.len(),
            "scanned source roots"
        );
        Ok(tree)
    }

    fn walk(
        &self,
        dir: &Path,
        kind: RootKind,
        ctx: &ModuleContext<'_>,
        tree: &mut SourceTree,
        units: &mut HashMap<String, (String, RootKind)>,
        module_dirs: &mut HashMap<String, PathBuf>,
    ) -> Result<(), ScanError> {
        let descriptor = dir.join(&self.module_descriptor);
        let module_ctx;
        let ctx = if descriptor.is_file() {
            let name = module_name_of(dir);
            if let Some(first) = module_dirs.get(&name) {
                if first != dir {
                    return Err(ScanError::DuplicateModule {
                        name,
                        first: first.clone(),
                        second: dir.to_path_buf(),
                    });
                }
            } else {
                debug!(module = %name, dir = %dir.display(), "found module descriptor");
                module_dirs.insert(name.clone(), dir.to_path_buf());
                tree.modules.insert(
                    name.clone(),
                    ModuleInfo {
                        name: name.clone(),
                        descriptor: Some(normalize(&descriptor)),
                    },
                );
            }
            module_ctx = ModuleContext { name, base: dir };
            &module_ctx
        } else {
            ctx
        };

        let mut entries = Vec::new();
        let read = std::fs::read_dir(dir).map_err(|e| ScanError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        for entry in read {
            let entry = entry.map_err(|e| ScanError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            entries.push(entry.path());
        }
        entries.sort();

        for path in entries {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }
            if path.is_dir() {
                self.walk(&path, kind, ctx, tree, units, module_dirs)?;
            } else {
                self.add_file(&path, kind, ctx, tree, units)?;
            }
        }
        Ok(())
    }

    fn add_file(
        &self,
        path: &Path,
        kind: RootKind,
        ctx: &ModuleContext<'_>,
        tree: &mut SourceTree,
        units: &mut HashMap<String, (String, RootKind)>,
    ) -> Result<(), ScanError> {
        let name = normalize(path);
        if !self.suffixes.contains(suffix_of(&name)) {
            return Ok(());
        }

        let package = package_of(path, ctx);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let unit = format!("{package}/{file_name}");

        match units.get(&unit) {
            Some((_, _)) if kind == RootKind::LinkOnly => {
                debug!(source = %name, "shadowed by an earlier root");
                return Ok(());
            }
            Some((first, RootKind::LinkOnly)) => {
                let first = first.clone();
                tree.sources.remove(&first);
            }
            Some((first, _)) => {
                return Err(ScanError::DuplicateSource {
                    unit,
                    first: first.clone(),
                    second: name,
                });
            }
            None => {}
        }

        let last_modified = modified_millis(path).map_err(|e| ScanError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let source = Source::new(name.clone(), package, last_modified)
            .with_generated(kind == RootKind::Generated)
            .with_link_only(kind == RootKind::LinkOnly);
        units.insert(unit, (name.clone(), kind));
        tree.sources.insert(name, source);
        Ok(())
    }
}

/// Renders a path with `/` separators, the form used for logical names.
pub fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn module_name_of(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            dir.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_default()
}

fn package_of(path: &Path, ctx: &ModuleContext<'_>) -> PackageName {
    let rel = path.strip_prefix(ctx.base).unwrap_or(path);
    let dotted = rel
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    PackageName::new(&ctx.name, &dotted)
}
