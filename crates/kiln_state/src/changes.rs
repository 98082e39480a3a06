//! Source change detection between two snapshots.

use crate::model::BuildState;

/// Differences between the sources of "prev" and "now".
///
/// The four categories are disjoint. `skewed` is the subset of `modified`
/// whose timestamp moved backwards, which usually means clock skew or a
/// version-control checkout; such sources are still treated as modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceChanges {
    /// Sources recorded in "prev" that no longer exist.
    pub removed: Vec<String>,
    /// Sources that are new in "now".
    pub added: Vec<String>,
    /// Sources present in both whose timestamp or role changed.
    pub modified: Vec<String>,
    /// Sources present in both that now belong to a different package,
    /// e.g. after a module descriptor was added or removed.
    pub moved: Vec<String>,
    /// Modified sources whose timestamp is older than recorded.
    pub skewed: Vec<String>,
}

impl SourceChanges {
    /// Returns `true` if no source changed in any way.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of changed sources.
    pub fn len(&self) -> usize {
        self.removed.len() + self.added.len() + self.modified.len() + self.moved.len()
    }
}

/// Compares the sources of two snapshots by logical name.
///
/// A source whose owning package differs is moved, whatever its timestamp.
/// Otherwise it counts as modified when its timestamp differs in either
/// direction, or when it switched between compiled and link-only or between
/// hand-written and generated.
pub fn diff_sources(prev: &BuildState, now: &BuildState) -> SourceChanges {
    let prev_sources = prev.source_map();
    let now_sources = now.source_map();
    let mut changes = SourceChanges::default();

    for (name, before) in &prev_sources {
        match now_sources.get(name) {
            None => changes.removed.push(name.to_string()),
            Some(after) if after.package() != before.package() => {
                changes.moved.push(name.to_string());
            }
            Some(after) => {
                let role_changed = before.is_link_only() != after.is_link_only()
                    || before.is_generated() != after.is_generated();
                if after.last_modified() < before.last_modified() {
                    changes.modified.push(name.to_string());
                    changes.skewed.push(name.to_string());
                } else if after.last_modified() > before.last_modified() || role_changed {
                    changes.modified.push(name.to_string());
                }
            }
        }
    }
    for name in now_sources.keys() {
        if !prev_sources.contains_key(name) {
            changes.added.push(name.to_string());
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::PackageName;
    use kiln_source::Source;

    fn state(sources: &[(&str, u64)]) -> BuildState {
        let mut state = BuildState::new("");
        let pkg = PackageName::new("", "a");
        for (name, ts) in sources {
            state
                .package_entry(&pkg)
                .add_source(Source::new(*name, pkg.clone(), *ts));
        }
        state
    }

    #[test]
    fn all_new() {
        let cs = diff_sources(&state(&[]), &state(&[("a/A.java", 1), ("a/B.java", 1)]));
        assert_eq!(cs.added, vec!["a/A.java", "a/B.java"]);
        assert!(cs.removed.is_empty());
        assert!(cs.modified.is_empty());
        assert_eq!(cs.len(), 2);
    }

    #[test]
    fn all_unchanged() {
        let s = state(&[("a/A.java", 5)]);
        let cs = diff_sources(&s, &s.clone());
        assert!(cs.is_empty());
    }

    #[test]
    fn removed_and_modified() {
        let prev = state(&[("a/A.java", 5), ("a/Gone.java", 5)]);
        let now = state(&[("a/A.java", 6)]);
        let cs = diff_sources(&prev, &now);
        assert_eq!(cs.removed, vec!["a/Gone.java"]);
        assert_eq!(cs.modified, vec!["a/A.java"]);
        assert!(cs.skewed.is_empty());
    }

    #[test]
    fn older_timestamp_is_modified_and_skewed() {
        let prev = state(&[("a/A.java", 10)]);
        let now = state(&[("a/A.java", 3)]);
        let cs = diff_sources(&prev, &now);
        assert_eq!(cs.modified, vec!["a/A.java"]);
        assert_eq!(cs.skewed, vec!["a/A.java"]);
    }

    #[test]
    fn package_change_is_moved() {
        let prev = state(&[("src/m/p/Q.java", 10)]);
        let mut now = BuildState::new("");
        let pkg = PackageName::new("m", "p");
        now.package_entry(&pkg)
            .add_source(Source::new("src/m/p/Q.java", pkg.clone(), 10));
        let cs = diff_sources(&prev, &now);
        assert_eq!(cs.moved, vec!["src/m/p/Q.java"]);
        assert!(cs.modified.is_empty() && cs.added.is_empty() && cs.removed.is_empty());
        assert_eq!(cs.len(), 1);
    }

    #[test]
    fn role_change_is_modified() {
        let prev = state(&[("a/A.java", 10)]);
        let mut now = BuildState::new("");
        let pkg = PackageName::new("", "a");
        now.package_entry(&pkg)
            .add_source(Source::new("a/A.java", pkg.clone(), 10).with_link_only(true));
        let cs = diff_sources(&prev, &now);
        assert_eq!(cs.modified, vec!["a/A.java"]);
    }
}
