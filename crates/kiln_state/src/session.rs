//! The per-build context holding both snapshots and the taint set.
//!
//! A [`BuildSession`] is owned by a single build driver. "prev" is read-only
//! for the whole build; "now" is written by the scan (before the session is
//! created) and by the driver's merge step after each round.

use std::collections::{BTreeMap, BTreeSet};

use kiln_common::{modified_millis, PackageName};
use kiln_source::Source;
use tracing::{debug, info, warn};

use crate::changes::{diff_sources, SourceChanges};
use crate::error::StateError;
use crate::model::BuildState;
use crate::store::StateStore;

/// Both snapshots of one build plus the packages tainted so far.
#[derive(Debug)]
pub struct BuildSession {
    pub(crate) prev: BuildState,
    pub(crate) now: BuildState,
    pub(crate) tainted: BTreeSet<PackageName>,
    pub(crate) dirty: bool,
}

impl BuildSession {
    /// Creates a session. A from-scratch build (discarded state) starts dirty
    /// so that the new state is written even if nothing ends up compiled.
    pub fn new(mut prev: BuildState, mut now: BuildState, fresh: bool) -> Self {
        prev.recompute_dependents();
        now.recompute_dependents();
        Self {
            prev,
            now,
            tainted: BTreeSet::new(),
            dirty: fresh,
        }
    }

    /// The snapshot loaded from the previous build.
    pub fn prev(&self) -> &BuildState {
        &self.prev
    }

    /// The snapshot being built.
    pub fn now(&self) -> &BuildState {
        &self.now
    }

    /// Mutable access to the snapshot being built.
    ///
    /// Callers that change dependency edges must call
    /// [`BuildState::recompute_dependents`] afterwards.
    pub fn now_mut(&mut self) -> &mut BuildState {
        self.dirty = true;
        &mut self.now
    }

    /// Returns `true` if the state changed since it was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records that the persisted state needs to be rewritten.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Compares the sources of both snapshots and taints the owning package
    /// of every removed, added, or modified source. A source that moved to
    /// another package taints both its old and its new package.
    ///
    /// On a build with no previous sources at all, additions are not logged
    /// individually.
    pub fn check_source_status(&mut self) -> SourceChanges {
        let changes = diff_sources(&self.prev, &self.now);
        let from_scratch = self.prev.sources().next().is_none();

        // (package, reason); no reason means taint without logging.
        let mut seeds: Vec<(PackageName, Option<String>)> = Vec::new();
        {
            let before = self.prev.source_map();
            let after = self.now.source_map();
            let owner = |map: &BTreeMap<&str, &Source>, name: &str| {
                map.get(name).map(|s| s.package().clone())
            };

            for name in &changes.removed {
                let reason = format!("source {name} was removed");
                seeds.extend(owner(&before, name).map(|p| (p, Some(reason))));
            }
            for name in &changes.added {
                let reason = (!from_scratch).then(|| format!("source {name} was added"));
                seeds.extend(owner(&after, name).map(|p| (p, reason)));
            }
            for name in &changes.modified {
                if changes.skewed.contains(name) {
                    warn!("source {name} is older than the previous build recorded; treating it as modified");
                }
                let reason = format!("source {name} was modified");
                seeds.extend(owner(&after, name).map(|p| (p, Some(reason))));
            }
            for name in &changes.moved {
                if let (Some(from), Some(to)) = (owner(&before, name), owner(&after, name)) {
                    let reason = format!("source {name} moved from {from} to {to}");
                    seeds.push((from, Some(reason.clone())));
                    seeds.push((to, Some(reason)));
                }
            }
        }

        for (pkg, reason) in &seeds {
            match reason {
                Some(reason) => self.taint(pkg, reason),
                None => self.taint_quietly(pkg),
            }
        }
        if from_scratch && !changes.added.is_empty() {
            info!(
                "found {} sources in {} packages, building from scratch",
                changes.added.len(),
                self.tainted.len()
            );
        }
        changes
    }

    /// Taints every package of "prev" with an artifact that was deleted or
    /// whose timestamp differs from the recorded one. Returns how many
    /// artifacts were found missing or changed.
    pub fn check_artifacts(&mut self) -> usize {
        let mut damaged = Vec::new();
        for (pkg, artifact) in self.prev.artifacts() {
            match modified_millis(artifact.path()) {
                Err(_) => damaged.push((pkg.clone(), format!("artifact {} was deleted", artifact.file))),
                Ok(ts) if ts != artifact.timestamp => {
                    damaged.push((pkg.clone(), format!("artifact {} was modified", artifact.file)))
                }
                Ok(_) => {}
            }
        }
        for (pkg, reason) in &damaged {
            self.taint(pkg, reason);
        }
        damaged.len()
    }

    /// Copies dependencies, API, and artifacts from "prev" into every "now"
    /// package that was not recompiled in this build, then rebuilds the
    /// dependents index. Carrying facts forward does not make the state
    /// dirty.
    pub fn inherit_unchanged(&mut self, recompiled: &BTreeSet<PackageName>) {
        let names: Vec<PackageName> = self.now.packages().keys().cloned().collect();
        for name in names {
            if recompiled.contains(&name) {
                continue;
            }
            if let (Some(old), Some(pkg)) = (self.prev.package(&name), self.now.package_mut(&name)) {
                pkg.inherit_compiled_facts(old);
            }
        }
        self.now.recompute_dependents();
    }

    /// Saves "now" if anything changed since load or the last save.
    /// Returns whether the file was written.
    pub fn save_if_dirty(&mut self, store: &StateStore) -> Result<bool, StateError> {
        if !self.dirty {
            debug!("build state unchanged, not saving");
            return Ok(false);
        }
        store.save(&self.now)?;
        self.dirty = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Artifact;
    use kiln_source::Source;

    fn name(p: &str) -> PackageName {
        PackageName::new("", p)
    }

    fn with_sources(sources: &[(&str, &str, u64)]) -> BuildState {
        let mut state = BuildState::new("");
        for (file, pkg, ts) in sources {
            state
                .package_entry(&name(pkg))
                .add_source(Source::new(*file, name(pkg), *ts));
        }
        state
    }

    #[test]
    fn modified_source_taints_its_package() {
        let prev = with_sources(&[("a/A.java", "a", 1), ("b/B.java", "b", 1)]);
        let now = with_sources(&[("a/A.java", "a", 2), ("b/B.java", "b", 1)]);
        let mut session = BuildSession::new(prev, now, false);
        session.check_source_status();
        assert_eq!(session.tainted(), &BTreeSet::from([name("a")]));
        assert!(session.is_dirty());
    }

    #[test]
    fn removed_source_taints_prev_package() {
        let prev = with_sources(&[("a/A.java", "a", 1), ("gone/G.java", "gone", 1)]);
        let now = with_sources(&[("a/A.java", "a", 1)]);
        let mut session = BuildSession::new(prev, now, false);
        session.check_source_status();
        assert_eq!(session.tainted(), &BTreeSet::from([name("gone")]));
    }

    #[test]
    fn moved_source_taints_old_and_new_package() {
        let prev = with_sources(&[("src/m/p/Q.java", "m.p", 1), ("src/a/A.java", "a", 1)]);
        let mut now = with_sources(&[("src/a/A.java", "a", 1)]);
        let moved = PackageName::new("m", "p");
        now.package_entry(&moved)
            .add_source(Source::new("src/m/p/Q.java", moved.clone(), 1));

        let mut session = BuildSession::new(prev, now, false);
        let changes = session.check_source_status();
        assert_eq!(changes.moved, vec!["src/m/p/Q.java"]);
        assert_eq!(session.tainted(), &BTreeSet::from([name("m.p"), moved]));
    }

    #[test]
    fn from_scratch_taints_everything() {
        let now = with_sources(&[("a/A.java", "a", 1), ("b/B.java", "b", 1)]);
        let mut session = BuildSession::new(BuildState::new(""), now, true);
        let changes = session.check_source_status();
        assert_eq!(changes.added.len(), 2);
        assert_eq!(session.tainted().len(), 2);
    }

    #[test]
    fn unchanged_build_is_clean() {
        let state = with_sources(&[("a/A.java", "a", 1)]);
        let mut session = BuildSession::new(state.clone(), state, false);
        assert!(session.check_source_status().is_empty());
        assert_eq!(session.check_artifacts(), 0);
        assert!(session.tainted().is_empty());
        assert!(!session.is_dirty());
    }

    #[test]
    fn deleted_artifact_taints_package() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("Kept.class");
        std::fs::write(&kept, "x").unwrap();
        let kept_ts = modified_millis(&kept).unwrap();

        let mut prev = with_sources(&[("a/A.java", "a", 1), ("b/B.java", "b", 1)]);
        prev.package_mut(&name("a")).unwrap().add_artifact(Artifact::new(
            "a/Gone.class",
            dir.path().join("Gone.class").to_string_lossy(),
            1,
        ));
        prev.package_mut(&name("b")).unwrap().add_artifact(Artifact::new(
            "b/Kept.class",
            kept.to_string_lossy(),
            kept_ts,
        ));
        let now = prev.clone();
        let mut session = BuildSession::new(prev, now, false);
        assert_eq!(session.check_artifacts(), 1);
        assert_eq!(session.tainted(), &BTreeSet::from([name("a")]));
    }

    #[test]
    fn replaced_artifact_taints_package() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.class");
        std::fs::write(&file, "x").unwrap();
        let ts = modified_millis(&file).unwrap();

        let mut prev = with_sources(&[("a/A.java", "a", 1)]);
        prev.package_mut(&name("a")).unwrap().add_artifact(Artifact::new(
            "a/A.class",
            file.to_string_lossy(),
            ts + 1_000,
        ));
        let mut session = BuildSession::new(prev.clone(), prev, false);
        assert_eq!(session.check_artifacts(), 1);
        assert!(session.is_tainted(&name("a")));
    }

    #[test]
    fn inherit_unchanged_copies_prev_facts() {
        let mut prev = with_sources(&[("a/A.java", "a", 1), ("b/B.java", "b", 1)]);
        prev.package_mut(&name("b")).unwrap().add_dependency(name("a"));
        prev.package_mut(&name("a"))
            .unwrap()
            .add_artifact(Artifact::new("a/A.class", "out/a/A.class", 3));
        let now = with_sources(&[("a/A.java", "a", 1), ("b/B.java", "b", 1)]);

        let mut session = BuildSession::new(prev, now, false);
        session.inherit_unchanged(&BTreeSet::from([name("b")]));
        let now = session.now();
        assert_eq!(now.package(&name("a")).unwrap().artifacts().len(), 1);
        assert!(now.package(&name("b")).unwrap().dependencies().is_empty());
        assert_eq!(now.dependents(&name("a")).count(), 0);
        assert!(!session.is_dirty());
    }

    #[test]
    fn save_if_dirty_gates_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let state = with_sources(&[("a/A.java", "a", 1)]);
        let mut session = BuildSession::new(state.clone(), state, false);

        assert!(!session.save_if_dirty(&store).unwrap());
        assert!(!store.path().exists());

        session.mark_dirty();
        assert!(session.save_if_dirty(&store).unwrap());
        assert!(store.path().exists());
        assert!(!session.save_if_dirty(&store).unwrap());
    }
}
