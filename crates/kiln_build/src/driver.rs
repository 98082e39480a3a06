//! The round-based compilation driver.
//!
//! Each round compiles every tainted package, merges the results into the
//! "now" snapshot, and taints the dependents of packages whose public API
//! changed. Rounds run until nothing is tainted (converged) or a transformer
//! fails, which ends the build without saving.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use kiln_common::{modified_millis, PackageName};
use kiln_config::BuildOptions;
use kiln_source::Source;
use kiln_state::{Artifact, BuildSession, PublicApi};
use tracing::{debug, info, warn};

use crate::error::BuildError;
use crate::transform::{CompiledPackage, TransformRequest, TransformSink, TransformerRegistry};

/// What the rounds of one build did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Number of rounds that compiled something.
    pub rounds: usize,
    /// Every package processed in any round.
    pub compiled: BTreeSet<PackageName>,
    /// Sum of the tainted-set sizes over all rounds.
    pub tainted_total: usize,
    /// Artifacts deleted ahead of recompilation.
    pub removed_artifacts: usize,
}

/// Runs compile rounds on a bounded worker pool.
pub struct Driver<'a> {
    options: &'a BuildOptions,
    registry: &'a TransformerRegistry,
    pool: rayon::ThreadPool,
}

impl<'a> Driver<'a> {
    /// Creates a driver whose pool has `options.cores` workers.
    pub fn new(options: &'a BuildOptions, registry: &'a TransformerRegistry) -> Result<Self, BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.cores)
            .thread_name(|i| format!("kiln-worker-{i}"))
            .build()?;
        Ok(Self {
            options,
            registry,
            pool,
        })
    }

    /// Runs rounds until convergence, starting from the session's tainted
    /// set.
    pub fn run(&self, session: &mut BuildSession) -> Result<RoundReport, BuildError> {
        let mut report = RoundReport::default();
        loop {
            let tainted = session.take_tainted();
            if tainted.is_empty() {
                break;
            }
            report.rounds += 1;
            report.tainted_total += tainted.len();
            let round = report.rounds;
            info!(
                "round {round}: compiling {} package{}",
                tainted.len(),
                if tainted.len() == 1 { "" } else { "s" }
            );
            debug!(round, packages = ?tainted, "tainted packages");

            report.removed_artifacts += delete_artifacts(session, &tainted);
            let results = self.compile(session, &tainted, round)?;
            merge(session, &tainted, results)?;
            let changed = changed_apis(session, &tainted);

            report.compiled.extend(tainted);
            let newly = session.propagate_from_changed_apis(&changed, &report.compiled);
            debug!(round, changed = changed.len(), newly_tainted = newly.len(), "round finished");
        }
        info!(rounds = report.rounds, "build converged");
        Ok(report)
    }

    /// Invokes one transformer per suffix group over the tainted packages'
    /// compiled sources.
    fn compile(
        &self,
        session: &BuildSession,
        tainted: &BTreeSet<PackageName>,
        round: usize,
    ) -> Result<BTreeMap<PackageName, CompiledPackage>, BuildError> {
        let now = session.now();
        let mut groups: BTreeMap<&str, BTreeMap<PackageName, Vec<&Source>>> = BTreeMap::new();
        for name in tainted {
            let Some(package) = now.package(name) else {
                debug!(package = %name, "no sources left, nothing to compile");
                continue;
            };
            for source in package.sources().values().filter(|s| !s.is_link_only()) {
                groups
                    .entry(source.suffix())
                    .or_default()
                    .entry(name.clone())
                    .or_default()
                    .push(source);
            }
        }
        let link_only: Vec<&Source> = now.sources().filter(|s| s.is_link_only()).collect();

        let sink = TransformSink::new();
        for (suffix, packages) in groups {
            let Some(transformer) = self.registry.get(suffix) else {
                warn!("no transformer registered for '{suffix}' sources, skipping them");
                continue;
            };
            let request = TransformRequest {
                packages,
                link_only: link_only.clone(),
                prev: session.prev(),
                output: &self.options.output,
                headers: self.options.headers.as_deref(),
                args: &self.options.compiler_args,
                pool: &self.pool,
            };
            debug!(
                round,
                suffix,
                kind = transformer.kind(),
                sources = request.source_count(),
                "invoking transformer"
            );
            transformer
                .transform(&request, &sink)
                .map_err(|source| BuildError::Transform {
                    round,
                    suffix: suffix.to_string(),
                    kind: transformer.kind().to_string(),
                    source,
                })?;
        }
        Ok(sink.into_results())
    }
}

/// Deletes every known artifact of the tainted packages so a failed round
/// cannot leave stale outputs that look fresh.
fn delete_artifacts(session: &BuildSession, tainted: &BTreeSet<PackageName>) -> usize {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();
    for name in tainted {
        for state in [session.prev(), session.now()] {
            if let Some(package) = state.package(name) {
                files.extend(package.artifacts().values().map(|a| a.path().to_path_buf()));
            }
        }
    }
    files.iter().filter(|f| crate::reconcile::remove_file(f)).count()
}

/// Writes the round's results into "now". Tainted packages that produced
/// nothing (no compiled sources) lose their compiled facts.
fn merge(
    session: &mut BuildSession,
    tainted: &BTreeSet<PackageName>,
    mut results: BTreeMap<PackageName, CompiledPackage>,
) -> Result<(), BuildError> {
    for (name, _) in results.iter().filter(|(n, _)| !tainted.contains(*n)) {
        debug!(package = %name, "ignoring results for a package that was not requested");
    }

    let now = session.now_mut();
    for name in tainted {
        let Some(package) = now.package_mut(name) else {
            continue;
        };
        let Some(compiled) = results.remove(name) else {
            package.set_dependencies(Vec::new());
            package.set_api(PublicApi::default());
            package.set_artifacts(Vec::new());
            continue;
        };

        let mut artifacts = Vec::with_capacity(compiled.artifacts.len());
        for (artifact, path) in compiled.artifacts {
            let timestamp = modified_millis(&path).map_err(|_| BuildError::MissingArtifact {
                package: name.to_string(),
                path: path.clone(),
            })?;
            artifacts.push(Artifact::new(artifact, path.to_string_lossy(), timestamp));
        }
        package.set_dependencies(compiled.dependencies);
        package.set_api(compiled.api);
        package.set_artifacts(artifacts);
    }
    now.recompute_dependents();
    Ok(())
}

/// Tainted packages whose public API differs from the previous build.
///
/// Packages compiled for the first time are not changes. A package that no
/// longer exists always counts as changed.
fn changed_apis(session: &BuildSession, tainted: &BTreeSet<PackageName>) -> BTreeSet<PackageName> {
    let mut changed = BTreeSet::new();
    for name in tainted {
        let Some(old) = session.prev().package(name) else {
            continue;
        };
        match session.now().package(name) {
            None => {
                info!("package {name} was removed");
                changed.insert(name.clone());
            }
            Some(new) if new.api() != old.api() => {
                info!(
                    "public API of {name} changed ({} -> {})",
                    old.api().digest().short(),
                    new.api().digest().short()
                );
                changed.insert(name.clone());
            }
            Some(_) => {}
        }
    }
    changed
}
