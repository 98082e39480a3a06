//! The line-tagged state file format.
//!
//! ```text
//! # kiln state ver 1.0 generated <epoch-millis> <date>
//! R <normalized arguments>
//! M <module> <descriptor>
//! P <module:package>
//! D <dependency>
//! I <api signature>
//! A <artifact-name> <artifact-file> <timestamp>
//! S C|L <source> <timestamp>
//! G C|L <generated source> <timestamp>
//! ```
//!
//! Artifact and module names are the first field of their record, so spaces
//! in them are written as `\s` and backslashes as `\\`.
//!
//! `M` opens a module context, `P` a package within the latest module, and
//! `D`/`I`/`A`/`S`/`G` belong to the latest package. Parsing is a pure
//! function over the text driven by an explicit [`Context`] so malformed
//! input can be tested without touching the file system.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use kiln_common::{Millis, PackageName};
use kiln_source::{Source, UNNAMED_MODULE};

use crate::model::{Artifact, BuildState};

/// Current state format version. Files with any other version are discarded.
pub const STATE_VERSION: &str = "1.0";

const HEADER_PREFIX: &str = "# kiln state ver ";

/// Placeholder for the unnamed module and for an absent descriptor.
const NONE_TOKEN: &str = "-";

const TAG_LEGEND: &[&str] = &[
    "# This file records the dependency graph of the last successful build.",
    "# R arguments that affect the build",
    "# M module-name module-descriptor",
    "# P module:package",
    "# D dependency on another package",
    "# I public api signature line",
    "# A artifact-name artifact-file timestamp",
    "# S C|L source-file timestamp (C compiled, L link only)",
    "# G C|L generated-source-file timestamp",
];

/// Why a state file could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The first line is not a kiln state header.
    #[error("missing state file header")]
    MissingHeader,

    /// The file was written by a different format version.
    #[error("state file version {found} does not match {expected}")]
    VersionMismatch {
        /// Version found in the header.
        found: String,
        /// Version this build understands.
        expected: String,
    },

    /// A record is malformed or out of order.
    #[error("line {line}: {reason}")]
    Syntax {
        /// One-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
}

/// Parser position: which record kinds are currently allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    /// Before the first `M`: only `R` may appear.
    Top,
    /// Inside a module, before its first `P`.
    Module(String),
    /// Inside a package.
    Package(String, PackageName),
}

/// Parses the full text of a state file.
pub fn parse_state(text: &str) -> Result<BuildState, ParseError> {
    let mut lines = text.lines().enumerate();

    let header = lines.next().map(|(_, l)| l).unwrap_or("");
    let version = header
        .strip_prefix(HEADER_PREFIX)
        .and_then(|rest| rest.split_whitespace().next())
        .ok_or(ParseError::MissingHeader)?;
    if version != STATE_VERSION {
        return Err(ParseError::VersionMismatch {
            found: version.to_string(),
            expected: STATE_VERSION.to_string(),
        });
    }

    let mut state = BuildState::new("");
    let mut args: Option<String> = None;
    let mut ctx = Context::Top;

    for (idx, raw) in lines {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let syntax = |reason: &str| ParseError::Syntax {
            line: line_no,
            reason: reason.to_string(),
        };

        let (tag, rest) = match line.split_once(' ') {
            Some((tag, rest)) => (tag, rest),
            None => (line, ""),
        };

        ctx = match (tag, ctx) {
            ("R", Context::Top) => {
                if args.is_some() {
                    return Err(syntax("duplicate R record"));
                }
                args = Some(rest.to_string());
                Context::Top
            }
            ("R", _) => return Err(syntax("R record after module records")),
            ("M", _) => {
                let (name, descriptor) = rest
                    .split_once(' ')
                    .ok_or_else(|| syntax("M record needs a name and a descriptor"))?;
                let name = match decode_none(name) {
                    Some(name) => unescape(name).ok_or_else(|| syntax("malformed module name"))?,
                    None => UNNAMED_MODULE.to_string(),
                };
                if name != UNNAMED_MODULE && state.modules().contains_key(&name) {
                    return Err(syntax("duplicate module"));
                }
                state.ensure_module(&name, decode_none(descriptor).map(str::to_string));
                Context::Module(name)
            }
            ("P", Context::Module(module)) | ("P", Context::Package(module, _)) => {
                let pkg = PackageName::parse(rest)
                    .ok_or_else(|| syntax("malformed package name"))?;
                if pkg.module() != module {
                    return Err(syntax("package outside its module"));
                }
                if state.package(&pkg).is_some() {
                    return Err(syntax("duplicate package"));
                }
                state.package_entry(&pkg);
                Context::Package(module, pkg)
            }
            ("P", Context::Top) => return Err(syntax("P record before any M record")),
            ("D", Context::Package(module, pkg)) => {
                let dep = PackageName::parse(rest)
                    .ok_or_else(|| syntax("malformed dependency name"))?;
                state.package_entry(&pkg).add_dependency(dep);
                Context::Package(module, pkg)
            }
            ("I", Context::Package(module, pkg)) => {
                state.package_entry(&pkg).push_api_line(rest);
                Context::Package(module, pkg)
            }
            ("A", Context::Package(module, pkg)) => {
                let (name, file_and_ts) = rest
                    .split_once(' ')
                    .ok_or_else(|| syntax("A record needs a name, a file and a timestamp"))?;
                let (file, ts) = split_timestamp(file_and_ts)
                    .ok_or_else(|| syntax("A record needs a file and a timestamp"))?;
                let name = unescape(name).ok_or_else(|| syntax("malformed artifact name"))?;
                state.package_entry(&pkg).add_artifact(Artifact::new(name, file, ts));
                Context::Package(module, pkg)
            }
            (tag @ ("S" | "G"), Context::Package(module, pkg)) => {
                let (kind, path_and_ts) = rest
                    .split_once(' ')
                    .ok_or_else(|| syntax("source record needs a kind, a file and a timestamp"))?;
                let link_only = match kind {
                    "C" => false,
                    "L" => true,
                    _ => return Err(syntax("source kind must be C or L")),
                };
                let (path, ts) = split_timestamp(path_and_ts)
                    .ok_or_else(|| syntax("source record needs a file and a timestamp"))?;
                let source = Source::new(path, pkg.clone(), ts)
                    .with_generated(tag == "G")
                    .with_link_only(link_only);
                state.package_entry(&pkg).add_source(source);
                Context::Package(module, pkg)
            }
            ("D" | "I" | "A" | "S" | "G", _) => {
                return Err(syntax("package record before any P record"))
            }
            _ => return Err(syntax("unknown record tag")),
        };
    }

    let mut state = state.with_args(args.unwrap_or_default());
    state.recompute_dependents();
    Ok(state)
}

/// Renders a state in the deterministic, sorted on-disk form.
///
/// `generated` only affects the header line, so two renders of the same
/// state with the same timestamp are byte-identical.
pub fn render_state(state: &BuildState, generated: Millis) -> String {
    let mut out = String::new();
    let date = i64::try_from(generated)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default();
    let _ = writeln!(out, "{HEADER_PREFIX}{STATE_VERSION} generated {generated} {date}");
    for line in TAG_LEGEND {
        out.push_str(line);
        out.push('\n');
    }
    let _ = writeln!(out, "R {}", state.args());

    for module in state.modules().values() {
        let _ = writeln!(
            out,
            "M {} {}",
            escape(encode_none(&module.name)),
            module.descriptor.as_deref().map_or(NONE_TOKEN, encode_none)
        );
        for package in state.packages_in(&module.name) {
            let _ = writeln!(out, "P {}", package.name());
            for dep in package.dependencies() {
                let _ = writeln!(out, "D {dep}");
            }
            for line in package.api().lines() {
                let _ = writeln!(out, "I {line}");
            }
            for artifact in package.artifacts().values() {
                let _ = writeln!(
                    out,
                    "A {} {} {}",
                    escape(&artifact.name),
                    artifact.file,
                    artifact.timestamp
                );
            }
            for source in package.sources().values() {
                let tag = if source.is_generated() { 'G' } else { 'S' };
                let kind = if source.is_link_only() { 'L' } else { 'C' };
                let _ = writeln!(
                    out,
                    "{tag} {kind} {} {}",
                    source.name(),
                    source.last_modified()
                );
            }
        }
    }
    out
}

fn split_timestamp(s: &str) -> Option<(&str, Millis)> {
    let (path, ts) = s.rsplit_once(' ')?;
    if path.is_empty() {
        return None;
    }
    Some((path, ts.parse().ok()?))
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace(' ', "\\s")
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            's' => out.push(' '),
            '\\' => out.push('\\'),
            _ => return None,
        }
    }
    Some(out)
}

fn encode_none(s: &str) -> &str {
    if s.is_empty() {
        NONE_TOKEN
    } else {
        s
    }
}

fn decode_none(s: &str) -> Option<&str> {
    if s == NONE_TOKEN || s.is_empty() {
        None
    } else {
        Some(s)
    }
}
