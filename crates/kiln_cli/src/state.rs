//! `kiln state`: prints what the last successful build recorded.

use std::fmt::Write;

use kiln_common::PackageName;
use kiln_state::{BuildState, StateStore};

use crate::{options, GlobalArgs, StateArgs};

/// Prints the state summary, or one package with `--package`. Returns exit
/// code 1 when there is no usable state or the package is unknown.
pub fn run(args: &StateArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let options = options::resolve(&args.build, global)?;
    let loaded = StateStore::new(&options.state_dir).load(&options.state_args());
    if let Some(reason) = loaded.discarded {
        eprintln!("no usable build state: {reason}");
        return Ok(1);
    }

    match &args.package {
        None => {
            print!("{}", summary(&loaded.state));
            Ok(0)
        }
        Some(name) => {
            let name = parse_package(name);
            match describe_package(&loaded.state, &name) {
                Some(text) => {
                    print!("{text}");
                    Ok(0)
                }
                None => {
                    eprintln!("unknown package {name}");
                    Ok(1)
                }
            }
        }
    }
}

/// Accepts `module:package`, or a bare package name in the unnamed module.
pub fn parse_package(name: &str) -> PackageName {
    PackageName::parse(name).unwrap_or_else(|| PackageName::new("", name))
}

/// Counts of everything in the state, followed by one line per module.
pub fn summary(state: &BuildState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "args:      {}", state.args());
    let _ = writeln!(out, "modules:   {}", state.modules().len());
    let _ = writeln!(out, "packages:  {}", state.packages().len());
    let _ = writeln!(out, "sources:   {}", state.sources().count());
    let _ = writeln!(out, "artifacts: {}", state.artifacts().count());
    for module in state.modules().values() {
        let label = if module.name.is_empty() { "(unnamed)" } else { module.name.as_str() };
        let _ = writeln!(
            out,
            "  {label}: {} packages{}",
            state.packages_in(&module.name).count(),
            module
                .descriptor
                .as_deref()
                .map(|d| format!(" ({d})"))
                .unwrap_or_default()
        );
    }
    out
}

/// Dependencies, dependents, API, and artifacts of one package.
pub fn describe_package(state: &BuildState, name: &PackageName) -> Option<String> {
    let package = state.package(name)?;
    let mut out = String::new();
    let _ = writeln!(out, "package {name}");
    let _ = writeln!(out, "dependencies:");
    for dep in package.dependencies() {
        let _ = writeln!(out, "  {dep}");
    }
    let _ = writeln!(out, "dependents:");
    for dependent in state.dependents(name) {
        let _ = writeln!(out, "  {dependent}");
    }
    let _ = writeln!(out, "api ({}):", package.api().digest().short());
    for line in package.api().lines() {
        let _ = writeln!(out, "  {line}");
    }
    let _ = writeln!(out, "artifacts:");
    for artifact in package.artifacts().values() {
        let _ = writeln!(out, "  {} -> {}", artifact.name, artifact.file);
    }
    let _ = writeln!(out, "sources:");
    for source in package.sources().values() {
        let flag = if source.is_link_only() { " (link-only)" } else { "" };
        let _ = writeln!(out, "  {}{flag}", source.name());
    }
    Some(out)
}
