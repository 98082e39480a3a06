//! Module-qualified package names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the module and package halves of a qualified name.
pub const MODULE_SEPARATOR: char = ':';

/// A package name qualified by its owning module, written `module:package`.
///
/// The unnamed (legacy) module has the empty module name, so packages in it
/// look like `:a.b`. The unnamed package of a module is `module:`. Package
/// identity across the "prev" and "now" snapshots is this full string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Builds a qualified name from a module name and a dotted package name.
    pub fn new(module: &str, package: &str) -> Self {
        Self(format!("{module}{MODULE_SEPARATOR}{package}"))
    }

    /// Parses a qualified name, returning `None` if the separator is missing
    /// or the name contains whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        if !s.contains(MODULE_SEPARATOR) || s.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(s.to_string()))
    }

    /// Returns the module half (empty for the unnamed module).
    pub fn module(&self) -> &str {
        self.split().0
    }

    /// Returns the dotted package half (empty for the unnamed package).
    pub fn package(&self) -> &str {
        self.split().1
    }

    /// Returns the full qualified name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the package as a relative directory path (`a.b` → `a/b`).
    pub fn package_dir(&self) -> String {
        self.package().replace('.', "/")
    }

    fn split(&self) -> (&str, &str) {
        self.0
            .split_once(MODULE_SEPARATOR)
            .unwrap_or(("", self.0.as_str()))
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageName({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_module_prefix() {
        let p = PackageName::new("", "a.b");
        assert_eq!(p.as_str(), ":a.b");
        assert_eq!(p.module(), "");
        assert_eq!(p.package(), "a.b");
    }

    #[test]
    fn named_module() {
        let p = PackageName::new("java.desktop", "java.awt");
        assert_eq!(p.to_string(), "java.desktop:java.awt");
        assert_eq!(p.module(), "java.desktop");
        assert_eq!(p.package_dir(), "java/awt");
    }

    #[test]
    fn unnamed_package() {
        let p = PackageName::new("m", "");
        assert_eq!(p.as_str(), "m:");
        assert_eq!(p.package(), "");
        assert_eq!(p.package_dir(), "");
    }

    #[test]
    fn parse_requires_separator() {
        assert!(PackageName::parse("a.b").is_none());
        assert!(PackageName::parse(":a b").is_none());
        assert_eq!(PackageName::parse(":a.b"), Some(PackageName::new("", "a.b")));
    }

    #[test]
    fn ordering_is_by_full_name() {
        let mut names = vec![
            PackageName::new("", "b"),
            PackageName::new("", "a.b"),
            PackageName::new("", "a"),
        ];
        names.sort();
        let strs: Vec<_> = names.iter().map(PackageName::as_str).collect();
        assert_eq!(strs, vec![":a", ":a.b", ":b"]);
    }
}
