//! Taint bookkeeping and transitive propagation.
//!
//! The tainted set only grows within a round. Propagation is a worklist over
//! the "now" dependents index, so the final set depends only on the seeds and
//! the graph, never on traversal order.

use std::collections::BTreeSet;

use kiln_common::PackageName;
use tracing::{debug, info};

use crate::session::BuildSession;

impl BuildSession {
    /// Packages tainted so far in the current round.
    pub fn tainted(&self) -> &BTreeSet<PackageName> {
        &self.tainted
    }

    /// Returns `true` if `name` is tainted.
    pub fn is_tainted(&self, name: &PackageName) -> bool {
        self.tainted.contains(name)
    }

    /// Removes and returns the tainted set, leaving it empty for the next
    /// round.
    pub fn take_tainted(&mut self) -> BTreeSet<PackageName> {
        std::mem::take(&mut self.tainted)
    }

    /// Marks `name` as needing recompilation, along with every package that
    /// transitively depends on it in the "now" graph. Already-tainted
    /// packages are left alone.
    pub fn taint(&mut self, name: &PackageName, reason: &str) {
        if self.tainted.contains(name) {
            return;
        }
        info!("tainting {name}: {reason}");
        self.spread(name, Some(name));
    }

    /// Like [`taint`](Self::taint) but without logging the seed, used when
    /// every package is new.
    pub(crate) fn taint_quietly(&mut self, name: &PackageName) {
        if !self.tainted.contains(name) {
            self.spread(name, None);
        }
    }

    fn spread(&mut self, seed: &PackageName, logged: Option<&PackageName>) {
        self.dirty = true;
        let mut work = vec![seed.clone()];
        while let Some(next) = work.pop() {
            if !self.tainted.insert(next.clone()) {
                continue;
            }
            if let Some(origin) = logged {
                if &next != origin {
                    debug!("tainting {next}: depends on {origin}");
                }
            }
            work.extend(
                self.now
                    .dependents(&next)
                    .filter(|d| !self.tainted.contains(*d))
                    .cloned(),
            );
        }
    }

    /// Taints every package of "prev" that depends on a package in
    /// `changed`, skipping packages already compiled during this build.
    /// Returns the packages newly tainted by this call.
    pub fn propagate_from_changed_apis(
        &mut self,
        changed: &BTreeSet<PackageName>,
        compiled: &BTreeSet<PackageName>,
    ) -> BTreeSet<PackageName> {
        let targets: Vec<(PackageName, PackageName)> = self
            .prev
            .packages()
            .values()
            .filter(|p| !compiled.contains(p.name()))
            .filter_map(|p| {
                p.dependencies()
                    .intersection(changed)
                    .next()
                    .map(|dep| (p.name().clone(), dep.clone()))
            })
            .collect();

        let before = self.tainted.clone();
        for (pkg, dep) in targets {
            self.taint(&pkg, &format!("public API of {dep} changed"));
        }
        self.tainted.difference(&before).cloned().collect()
    }
}
