//! `kiln build`: runs an incremental build and reports what it did.

use kiln_build::BuildOutcome;

use crate::{options, BuildArgs, GlobalArgs};

/// Runs the build. Returns exit code 0 on success; failures are errors.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let options = options::resolve(args, global)?;
    let outcome = kiln_build::build(&options)?;
    if !global.quiet {
        println!("{}", summary(&outcome));
    }
    Ok(0)
}

/// One-line report of a finished build.
pub fn summary(outcome: &BuildOutcome) -> String {
    if outcome.is_up_to_date() {
        return "kiln: up to date".to_string();
    }
    let plural = |n: usize, word: &str| {
        if n == 1 {
            format!("{n} {word}")
        } else {
            format!("{n} {word}s")
        }
    };
    let mut line = format!(
        "kiln: compiled {} in {}",
        plural(outcome.compiled.len(), "package"),
        plural(outcome.rounds, "round")
    );
    if outcome.removed_artifacts > 0 {
        line.push_str(&format!(", removed {}", plural(outcome.removed_artifacts, "stale file")));
    }
    if outcome.discarded.is_some() {
        line.push_str(" (full build)");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::PackageName;
    use kiln_state::DiscardReason;
    use std::collections::BTreeSet;

    fn outcome(rounds: usize, compiled: &[&str]) -> BuildOutcome {
        BuildOutcome {
            rounds,
            compiled: compiled.iter().map(|p| PackageName::new("", p)).collect::<BTreeSet<_>>(),
            tainted_total: compiled.len(),
            removed_artifacts: 0,
            state_saved: rounds > 0,
            discarded: None,
        }
    }

    #[test]
    fn summary_up_to_date() {
        assert_eq!(summary(&outcome(0, &[])), "kiln: up to date");
    }

    #[test]
    fn summary_counts() {
        assert_eq!(
            summary(&outcome(2, &["a", "a.b"])),
            "kiln: compiled 2 packages in 2 rounds"
        );
        let mut full = outcome(1, &["a"]);
        full.removed_artifacts = 1;
        full.discarded = Some(DiscardReason::Missing);
        assert_eq!(
            summary(&full),
            "kiln: compiled 1 package in 1 round, removed 1 stale file (full build)"
        );
    }
}
