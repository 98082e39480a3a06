//! Cleanup of output roots after a successful build.
//!
//! Every removal is best-effort: a file that cannot be deleted is logged and
//! skipped.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use kiln_common::PackageName;
use kiln_state::BuildState;
use tracing::{debug, warn};

/// Removes `path`, returning whether a file was actually deleted.
pub(crate) fn remove_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("could not remove {}: {e}", path.display());
            false
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Deletes artifacts that recompiled packages had in "prev" but no longer
/// produce.
pub fn remove_superfluous(prev: &BuildState, now: &BuildState, recompiled: &BTreeSet<PackageName>) -> usize {
    let mut removed = 0;
    for name in recompiled {
        let Some(old) = prev.package(name) else {
            continue;
        };
        let current: HashSet<&str> = now
            .package(name)
            .map(|p| p.artifacts().values().map(|a| a.file.as_str()).collect())
            .unwrap_or_default();
        for artifact in old.artifacts().values() {
            if !current.contains(artifact.file.as_str()) && remove_file(artifact.path()) {
                removed += 1;
            }
        }
    }
    removed
}

/// Deletes every file under `roots` that is not an artifact of `now`,
/// except the files in `keep`.
pub fn remove_unidentified(roots: &[&Path], now: &BuildState, keep: &[&Path]) -> usize {
    let mut known: HashSet<PathBuf> = now.artifacts().map(|(_, a)| canonical(a.path())).collect();
    known.extend(keep.iter().map(|p| canonical(p)));

    let mut removed = 0;
    for root in roots {
        let mut files = Vec::new();
        collect_files(root, &mut files);
        for file in files {
            if !known.contains(&canonical(&file)) {
                debug!(path = %file.display(), "unidentified artifact");
                if remove_file(&file) {
                    removed += 1;
                }
            }
        }
    }
    removed
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!("could not list {}: {e}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}
