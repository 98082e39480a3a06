//! A transformer that delegates to an external command.
//!
//! The command reads one JSON request from stdin and writes one JSON
//! response to stdout:
//!
//! ```text
//! request:  {"packages": {"pkg": ["path", ..]}, "link_only": ["path", ..],
//!            "dependencies": {"pkg": ["dep", ..]}, "output": "dir",
//!            "headers": "dir" | null, "args": [..]}
//! response: {"success": true, "artifacts": {"pkg": {"name": "path"}},
//!            "dependencies": {"pkg": ["dep", ..]}, "apis": {"pkg": "line\nline"}}
//! ```
//!
//! Package names are module-qualified (`module:package`). Relative artifact
//! paths are resolved against the output root. Anything the command writes
//! to stderr is passed through.

use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, Stdio};

use kiln_common::PackageName;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransformError;
use crate::transform::{TransformRequest, TransformSink, Transformer};

#[derive(Debug, Serialize)]
struct Request<'a> {
    packages: BTreeMap<&'a str, Vec<&'a str>>,
    link_only: Vec<&'a str>,
    dependencies: BTreeMap<&'a str, Vec<&'a str>>,
    output: String,
    headers: Option<String>,
    args: &'a [String],
}

#[derive(Debug, Deserialize)]
struct Response {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    artifacts: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    dependencies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    apis: BTreeMap<String, String>,
}

/// Runs a configured command for every batch of packages.
#[derive(Debug, Clone)]
pub struct ProcessTransformer {
    command: Vec<String>,
}

impl ProcessTransformer {
    /// Creates a transformer running `command` (program then arguments).
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn program(&self) -> String {
        self.command.first().cloned().unwrap_or_default()
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let program = self.program();
        let fail = |reason: String| TransformError::Command {
            command: program.clone(),
            reason,
        };
        let mut child = Command::new(&program)
            .args(self.command.iter().skip(1))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| fail(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| fail("stdin was not captured".to_string()))?;
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input));
            let output = child.wait_with_output();
            // A command that exits without reading its input is judged by its
            // exit status below, so a broken pipe here is not an error.
            let _ = writer.join();
            output
        })
        .map_err(|e| fail(e.to_string()))?;

        if !output.status.success() {
            return Err(fail(format!("exited with {}", output.status)));
        }
        Ok(output.stdout)
    }
}

fn parse_name(name: &str) -> Result<PackageName, TransformError> {
    PackageName::parse(name).ok_or_else(|| {
        TransformError::Protocol(<serde_json::Error as serde::de::Error>::custom(format!(
            "invalid package name '{name}'"
        )))
    })
}

impl Transformer for ProcessTransformer {
    fn kind(&self) -> &'static str {
        "process"
    }

    fn accepts(&self, _suffix: &str) -> bool {
        !self.command.is_empty()
    }

    fn transform(&self, request: &TransformRequest<'_>, sink: &TransformSink) -> Result<(), TransformError> {
        let body = Request {
            packages: request
                .packages
                .iter()
                .map(|(pkg, sources)| (pkg.as_str(), sources.iter().map(|s| s.name()).collect()))
                .collect(),
            link_only: request.link_only.iter().map(|s| s.name()).collect(),
            dependencies: request
                .prev
                .packages()
                .values()
                .filter(|p| !p.dependencies().is_empty())
                .map(|p| (p.name().as_str(), p.dependencies().iter().map(PackageName::as_str).collect()))
                .collect(),
            output: request.output.to_string_lossy().into_owned(),
            headers: request.headers.map(|h| h.to_string_lossy().into_owned()),
            args: request.args,
        };
        let input = serde_json::to_vec(&body)?;
        debug!(
            command = %self.program(),
            packages = request.packages.len(),
            sources = request.source_count(),
            "running transformer command"
        );

        let stdout = self.run(&input)?;
        let response: Response = serde_json::from_slice(&stdout)?;
        if !response.success {
            return Err(TransformError::Reported(
                response
                    .message
                    .unwrap_or_else(|| "compilation failed".to_string()),
            ));
        }

        for package in request.packages.keys() {
            sink.mark_compiled(package);
        }
        for (pkg, artifacts) in &response.artifacts {
            let pkg = parse_name(pkg)?;
            for (name, path) in artifacts {
                sink.add_artifact(&pkg, name.clone(), request.output.join(path));
            }
        }
        for (pkg, deps) in &response.dependencies {
            let pkg = parse_name(pkg)?;
            for dep in deps {
                sink.add_dependency(&pkg, parse_name(dep)?);
            }
        }
        for (pkg, api) in &response.apis {
            sink.add_api(&parse_name(pkg)?, api);
        }
        Ok(())
    }
}
