//! Incremental build orchestration.
//!
//! [`build`] loads the previous state, scans the source roots, taints what
//! changed, runs compile rounds until the public APIs settle, saves the new
//! state and cleans the output roots.

#![warn(missing_docs)]

pub mod copy;
pub mod driver;
pub mod error;
pub mod process;
pub mod reconcile;
pub mod transform;

use std::collections::BTreeSet;

use kiln_common::PackageName;
use kiln_config::BuildOptions;
use kiln_source::SourceScanner;
use kiln_state::{BuildSession, BuildState, DiscardReason, StateStore};
use tracing::info;

pub use copy::CopyTransformer;
pub use driver::{Driver, RoundReport};
pub use error::{BuildError, TransformError};
pub use process::ProcessTransformer;
pub use transform::{CompiledPackage, TransformRequest, TransformSink, Transformer, TransformerRegistry};

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Compile rounds run; zero when everything was up to date.
    pub rounds: usize,
    /// Packages compiled in any round.
    pub compiled: BTreeSet<PackageName>,
    /// Sum of the tainted-set sizes over all rounds.
    pub tainted_total: usize,
    /// Output files deleted (stale, superfluous, or unidentified).
    pub removed_artifacts: usize,
    /// Whether the state file was rewritten.
    pub state_saved: bool,
    /// Why the previous state was not used, for a from-scratch build.
    pub discarded: Option<DiscardReason>,
}

impl BuildOutcome {
    /// Returns `true` if nothing had to be compiled.
    pub fn is_up_to_date(&self) -> bool {
        self.rounds == 0
    }
}

/// Runs an incremental build with the transformers named in `options`.
pub fn build(options: &BuildOptions) -> Result<BuildOutcome, BuildError> {
    let registry = TransformerRegistry::from_options(options)?;
    build_with(options, &registry)
}

/// Runs an incremental build with an explicit transformer registry.
///
/// On any error the previous state file is left untouched.
pub fn build_with(options: &BuildOptions, registry: &TransformerRegistry) -> Result<BuildOutcome, BuildError> {
    let args = options.state_args();
    let store = StateStore::new(&options.state_dir);
    let loaded = store.load(&args);
    let fresh = loaded.is_fresh();

    let tree = SourceScanner::new(registry.suffixes(), options.module_descriptor.as_str())
        .scan(&options.roots)?;
    options.check_found_sources(tree.compiled().map(|s| s.name()))?;
    let now = BuildState::from_tree(&tree, args);

    let mut session = BuildSession::new(loaded.state, now, fresh);
    session.check_source_status();
    session.check_artifacts();

    let report = Driver::new(options, registry)?.run(&mut session)?;

    session.inherit_unchanged(&report.compiled);
    let state_saved = session.save_if_dirty(&store)?;

    let mut removed = report.removed_artifacts;
    removed += reconcile::remove_superfluous(session.prev(), session.now(), &report.compiled);
    if !options.permit_unidentified_artifacts {
        let state_file = store.path();
        removed += reconcile::remove_unidentified(
            &options.output_roots(),
            session.now(),
            &[state_file.as_path()],
        );
    }

    if report.rounds == 0 {
        info!("everything is up to date");
    } else {
        info!(
            "compiled {} package{} in {} round{}",
            report.compiled.len(),
            if report.compiled.len() == 1 { "" } else { "s" },
            report.rounds,
            if report.rounds == 1 { "" } else { "s" }
        );
    }

    Ok(BuildOutcome {
        rounds: report.rounds,
        compiled: report.compiled,
        tainted_total: report.tainted_total,
        removed_artifacts: removed,
        state_saved,
        discarded: loaded.discarded,
    })
}
