//! A single compilation unit.

use std::cmp::Ordering;
use std::path::Path;

use kiln_common::{Millis, PackageName};

/// One compilation unit found under a source root.
///
/// A source is identified by its logical name: the root-qualified relative
/// path with `/` separators (e.g. `src/a/b/C.java`). Equality and ordering
/// consider only the name.
#[derive(Debug, Clone)]
pub struct Source {
    name: String,
    suffix: String,
    package: PackageName,
    last_modified: Millis,
    generated: bool,
    link_only: bool,
}

impl Source {
    /// Creates a hand-written, compiled source.
    pub fn new(name: impl Into<String>, package: PackageName, last_modified: Millis) -> Self {
        let name = name.into();
        let suffix = suffix_of(&name).to_string();
        Self {
            name,
            suffix,
            package,
            last_modified,
            generated: false,
            link_only: false,
        }
    }

    /// Marks this source as produced by a translator rather than hand-written.
    pub fn with_generated(mut self, generated: bool) -> Self {
        self.generated = generated;
        self
    }

    /// Marks this source as visible for resolution only.
    pub fn with_link_only(mut self, link_only: bool) -> Self {
        self.link_only = link_only;
        self
    }

    /// The logical name, which doubles as the on-disk path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The on-disk location of this source.
    pub fn path(&self) -> &Path {
        Path::new(&self.name)
    }

    /// The file suffix including the leading dot (`.java`), or empty.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// The owning package.
    pub fn package(&self) -> &PackageName {
        &self.package
    }

    /// The owning module (empty for the unnamed module).
    pub fn module(&self) -> &str {
        self.package.module()
    }

    /// Last-modified timestamp in epoch milliseconds.
    pub fn last_modified(&self) -> Millis {
        self.last_modified
    }

    /// Whether this source was produced by a translator.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Whether this source is visible for linking but not compiled.
    pub fn is_link_only(&self) -> bool {
        self.link_only
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Source {}

impl PartialOrd for Source {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Source {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// Returns the suffix of a file name including the dot, or `""`.
pub fn suffix_of(name: &str) -> &str {
    let file = name.rsplit('/').next().unwrap_or(name);
    match file.rfind('.') {
        Some(0) | None => "",
        Some(i) => &file[i..],
    }
}
