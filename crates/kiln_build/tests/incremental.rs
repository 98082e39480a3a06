//! End-to-end incremental build scenarios.
//!
//! Sources are tiny scripts: `import <package>` lines declare dependencies,
//! `api <signature>` lines make up the public API, a line reading `header`
//! also writes a header into the header root, and a line reading `error`
//! makes compilation fail. Each artifact records which transformer
//! invocation wrote it.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kiln_build::{
    build, build_with, BuildError, BuildOutcome, TransformError, TransformRequest, TransformSink, Transformer,
    TransformerRegistry,
};
use kiln_common::PackageName;
use kiln_config::{load_config_from_str, BuildOptions, ConfigError, Overrides};
use kiln_state::{BuildState, DiscardReason, StateStore};

#[derive(Default)]
struct Scripted {
    invocations: AtomicUsize,
    log: Mutex<Vec<BTreeSet<String>>>,
}

impl Scripted {
    fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    fn last_batch(&self) -> BTreeSet<String> {
        self.log.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn batches_since(&self, start: usize) -> Vec<BTreeSet<String>> {
        self.log.lock().unwrap()[start..].to_vec()
    }
}

impl Transformer for Scripted {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn accepts(&self, suffix: &str) -> bool {
        suffix == ".java"
    }

    fn transform(&self, request: &TransformRequest<'_>, sink: &TransformSink) -> Result<(), TransformError> {
        let n = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        self.log
            .lock()
            .unwrap()
            .push(request.packages.keys().map(|p| p.to_string()).collect());

        for (pkg, sources) in &request.packages {
            sink.mark_compiled(pkg);
            for source in sources {
                let text = fs::read_to_string(source.path()).map_err(|e| TransformError::Io {
                    path: source.path().to_path_buf(),
                    source: e,
                })?;
                let stem = source.path().file_stem().unwrap().to_string_lossy().into_owned();
                let mut api = String::new();
                for line in text.lines() {
                    if let Some(dep) = line.strip_prefix("import ") {
                        sink.add_dependency(pkg, PackageName::new("", dep.trim()));
                    } else if let Some(sig) = line.strip_prefix("api ") {
                        api.push_str(sig);
                        api.push('\n');
                    } else if line.trim() == "header" {
                        let headers = request.headers.expect("header root configured");
                        let name = format!("{}_{stem}.h", pkg.package().replace('.', "_"));
                        let dest = headers.join(&name);
                        fs::create_dir_all(headers).unwrap();
                        fs::write(&dest, "#pragma once\n").unwrap();
                        sink.add_artifact(pkg, name, dest);
                    } else if line.trim() == "error" {
                        return Err(TransformError::Reported(format!("{}: error", source.name())));
                    }
                }
                sink.add_api(pkg, &api);

                let rel = if pkg.package().is_empty() {
                    format!("{stem}.class")
                } else {
                    format!("{}/{stem}.class", pkg.package_dir())
                };
                let dest = request.output.join(&rel);
                fs::create_dir_all(dest.parent().unwrap()).unwrap();
                fs::write(&dest, format!("invocation {n}\n{text}")).unwrap();
                sink.add_artifact(pkg, rel, dest);
            }
        }
        Ok(())
    }
}

const CONFIG: &str = r#"
[build]
roots = ["src"]
output = "out"

[transformers]
".java" = { kind = "copy" }
"#;

const HEADERS_CONFIG: &str = r#"
[build]
roots = ["src"]
output = "out"
headers = "hdr"

[transformers]
".java" = { kind = "copy" }
"#;

const RESOURCES_CONFIG: &str = r#"
[build]
roots = ["src"]
output = "out"

[transformers]
".properties" = { kind = "copy" }
"#;

struct Project {
    dir: tempfile::TempDir,
    scripted: Arc<Scripted>,
    registry: TransformerRegistry,
}

impl Project {
    /// Package `a` and package `a.b`, where `a.b` depends on `a`.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(Scripted::default());
        let mut registry = TransformerRegistry::new();
        registry.register(".java", scripted.clone()).unwrap();
        let project = Self {
            dir,
            scripted,
            registry,
        };
        project.write("src/a/A.java", "api class A\napi void f()\n");
        project.write("src/a/b/B.java", "import a\napi class B\n");
        project
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn out(&self, rel: &str) -> PathBuf {
        self.path("out").join(rel)
    }

    /// Writes a file and moves its timestamp clearly past any earlier one.
    fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        let before = fs::metadata(&path).and_then(|m| m.modified()).ok();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        if let Some(before) = before {
            bump(&path, before);
        }
    }

    fn touch(&self, rel: &str) {
        let path = self.path(rel);
        let before = fs::metadata(&path).unwrap().modified().unwrap();
        bump(&path, before);
    }

    fn options(&self, config: &str, overrides: Overrides) -> BuildOptions {
        BuildOptions::resolve(load_config_from_str(config).unwrap(), self.dir.path(), overrides).unwrap()
    }

    fn build(&self) -> Result<BuildOutcome, BuildError> {
        self.build_with(CONFIG, Overrides::default())
    }

    fn build_with(&self, config: &str, overrides: Overrides) -> Result<BuildOutcome, BuildError> {
        build_with(&self.options(config, overrides), &self.registry)
    }

    fn state(&self) -> BuildState {
        let options = self.options(CONFIG, Overrides::default());
        let loaded = StateStore::new(&options.state_dir).load(&options.state_args());
        assert!(!loaded.is_fresh());
        loaded.state
    }
}

fn bump(path: &Path, before: std::time::SystemTime) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(before + Duration::from_secs(5)).unwrap();
}

fn name(p: &str) -> PackageName {
    PackageName::new("", p)
}

fn names(list: &[&str]) -> BTreeSet<PackageName> {
    list.iter().map(|p| name(p)).collect()
}

fn strings(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn first_build_compiles_everything_in_one_round() {
    let project = Project::new();
    let outcome = project.build().unwrap();

    assert_eq!(outcome.discarded, Some(DiscardReason::Missing));
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.compiled, names(&["a", "a.b"]));
    assert!(outcome.state_saved);
    assert_eq!(project.scripted.last_batch(), strings(&[":a", ":a.b"]));
    assert!(project.out("a/A.class").exists());
    assert!(project.out("a/b/B.class").exists());
    assert!(project.out(".kiln_state").exists());
}

#[test]
fn clean_rebuild_compiles_nothing() {
    let project = Project::new();
    project.build().unwrap();
    let state_before = fs::read(project.out(".kiln_state")).unwrap();
    let invocations = project.scripted.invocations();

    let outcome = project.build().unwrap();
    assert!(outcome.is_up_to_date());
    assert_eq!(outcome.tainted_total, 0);
    assert!(outcome.discarded.is_none());
    assert!(!outcome.state_saved);
    assert_eq!(project.scripted.invocations(), invocations);
    assert_eq!(fs::read(project.out(".kiln_state")).unwrap(), state_before);
}

#[test]
fn api_change_recompiles_dependents_in_next_round() {
    let project = Project::new();
    project.build().unwrap();
    let start = project.scripted.invocations();

    project.write("src/a/A.java", "api class A\napi void g()\n");
    let outcome = project.build().unwrap();

    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.compiled, names(&["a", "a.b"]));
    assert_eq!(
        project.scripted.batches_since(start),
        vec![strings(&[":a"]), strings(&[":a.b"])]
    );

    let state = project.state();
    let dependents: Vec<_> = state.dependents(&name("a")).cloned().collect();
    assert_eq!(dependents, vec![name("a.b")]);
    for (_, artifact) in state.artifacts() {
        let on_disk = kiln_common::modified_millis(artifact.path()).unwrap();
        assert_eq!(on_disk, artifact.timestamp);
    }
    assert!(fs::read_to_string(project.out("a/A.class")).unwrap().starts_with("invocation 2"));
    assert!(fs::read_to_string(project.out("a/b/B.class")).unwrap().starts_with("invocation 3"));

    let again = project.build().unwrap();
    assert!(again.is_up_to_date());
}

#[test]
fn unchanged_api_does_not_propagate() {
    let project = Project::new();
    project.build().unwrap();

    project.touch("src/a/A.java");
    let outcome = project.build().unwrap();

    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.compiled, names(&["a"]));
    assert_eq!(project.scripted.last_batch(), strings(&[":a"]));
    assert!(fs::read_to_string(project.out("a/b/B.class")).unwrap().starts_with("invocation 1"));
}

#[test]
fn dependents_compiled_in_the_same_round_are_not_retainted() {
    let project = Project::new();
    project.build().unwrap();

    project.write("src/a/A.java", "api class A\napi void g()\n");
    project.touch("src/a/b/B.java");
    let outcome = project.build().unwrap();

    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.compiled, names(&["a", "a.b"]));
}

#[test]
fn deleted_artifact_triggers_rebuild_of_its_package() {
    let project = Project::new();
    project.build().unwrap();

    fs::remove_file(project.out("a/b/B.class")).unwrap();
    let outcome = project.build().unwrap();

    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.compiled, names(&["a.b"]));
    assert!(project.out("a/b/B.class").exists());
}

#[test]
fn removed_package_taints_its_dependents() {
    let project = Project::new();
    project.build().unwrap();

    fs::remove_file(project.path("src/a/A.java")).unwrap();
    let outcome = project.build().unwrap();

    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.compiled, names(&["a", "a.b"]));
    assert_eq!(project.scripted.last_batch(), strings(&[":a.b"]));
    assert!(!project.out("a/A.class").exists());
    assert!(project.state().package(&name("a")).is_none());
}

#[test]
fn failed_build_keeps_previous_state() {
    let project = Project::new();
    project.build().unwrap();
    let state_before = fs::read(project.out(".kiln_state")).unwrap();

    project.write("src/a/A.java", "api class A\nerror\n");
    let err = project.build().unwrap_err();
    assert!(matches!(err, BuildError::Transform { round: 1, .. }));
    assert_eq!(fs::read(project.out(".kiln_state")).unwrap(), state_before);

    project.write("src/a/A.java", "api class A\napi void f()\n");
    let outcome = project.build().unwrap();
    assert!(outcome.compiled.contains(&name("a")));
    assert!(project.out("a/A.class").exists());
}

#[test]
fn unidentified_files_are_removed_unless_permitted() {
    let project = Project::new();
    project.build().unwrap();

    fs::write(project.out("a/Stray.class"), "?").unwrap();
    let permitted = project
        .build_with(
            CONFIG,
            Overrides {
                permit_unidentified_artifacts: true,
                ..Overrides::default()
            },
        )
        .unwrap();
    assert!(permitted.is_up_to_date());
    assert!(project.out("a/Stray.class").exists());

    let outcome = project.build().unwrap();
    assert_eq!(outcome.removed_artifacts, 1);
    assert!(!project.out("a/Stray.class").exists());
    assert!(project.out("a/A.class").exists());
    assert!(project.out(".kiln_state").exists());
}

#[test]
fn changed_arguments_force_full_rebuild() {
    let project = Project::new();
    project.build().unwrap();

    let config = CONFIG.replace("output = \"out\"", "output = \"out\"\ncompiler_args = [\"-g\"]");
    let outcome = project.build_with(&config, Overrides::default()).unwrap();
    assert_eq!(outcome.discarded, Some(DiscardReason::ArgsChanged));
    assert_eq!(outcome.compiled, names(&["a", "a.b"]));
}

#[test]
fn corrupt_state_forces_full_rebuild() {
    let project = Project::new();
    project.build().unwrap();

    fs::write(project.out(".kiln_state"), "garbage\n").unwrap();
    let outcome = project.build().unwrap();
    assert!(matches!(outcome.discarded, Some(DiscardReason::Syntax(_))));
    assert_eq!(outcome.compiled, names(&["a", "a.b"]));
    assert!(outcome.state_saved);
}

#[test]
fn new_source_taints_its_package_only() {
    let project = Project::new();
    project.build().unwrap();

    project.write("src/c/C.java", "api class C\n");
    let outcome = project.build().unwrap();
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.compiled, names(&["c"]));
    assert!(project.out("c/C.class").exists());
}

#[test]
fn expected_source_list_mismatch_is_fatal() {
    let project = Project::new();
    let list = project.path("sources.txt");
    let root = project.path("src").to_string_lossy().replace('\\', "/");
    fs::write(&list, format!("{root}/a/A.java\n{root}/z/Z.java\n")).unwrap();

    let err = project
        .build_with(
            CONFIG,
            Overrides {
                compare_found_sources: Some(list),
                ..Overrides::default()
            },
        )
        .unwrap_err();
    match err {
        BuildError::Config(ConfigError::SourceListMismatch { missing, extra }) => {
            assert_eq!(missing, vec![format!("{root}/z/Z.java")]);
            assert_eq!(extra, vec![format!("{root}/a/b/B.java")]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!project.out(".kiln_state").exists());
}

#[test]
fn module_descriptor_moves_sources_into_the_module() {
    let project = Project::new();
    project.write("src/m/p/Q.java", "api class Q\n");
    let first = project.build().unwrap();
    assert!(first.compiled.contains(&name("m.p")));
    assert!(project.out("m/p/Q.class").exists());

    project.write("src/m/module-info.java", "");
    let outcome = project.build().unwrap();
    let moved = PackageName::new("m", "p");
    assert!(outcome.compiled.contains(&moved));
    assert!(outcome.compiled.contains(&name("m.p")));
    assert!(project.out("p/Q.class").exists());
    assert!(!project.out("m/p/Q.class").exists());

    let state = project.state();
    assert!(state.package(&name("m.p")).is_none());
    assert_eq!(state.package(&moved).unwrap().artifacts().len(), 1);

    assert!(project.build().unwrap().is_up_to_date());
    assert!(project.out("p/Q.class").exists());
}

#[test]
fn resources_with_spaces_in_their_names_stay_up_to_date() {
    let project = Project::new();
    project.write("src/a/my file.properties", "k=v\n");
    let options = project.options(RESOURCES_CONFIG, Overrides::default());

    let first = build(&options).unwrap();
    assert_eq!(first.compiled, names(&["a"]));
    assert!(project.out("a/my file.properties").exists());

    let second = build(&options).unwrap();
    assert!(second.is_up_to_date());
    assert_eq!(second.tainted_total, 0);
    assert!(project.out("a/my file.properties").exists());
}

#[test]
fn headers_written_to_the_header_root_survive_cleanup() {
    let project = Project::new();
    project.write("src/a/A.java", "api class A\napi void f()\nheader\n");
    project.build_with(HEADERS_CONFIG, Overrides::default()).unwrap();
    assert!(project.path("hdr/a_A.h").exists());

    fs::write(project.path("hdr/Stray.h"), "?").unwrap();
    let outcome = project.build_with(HEADERS_CONFIG, Overrides::default()).unwrap();
    assert!(outcome.is_up_to_date());
    assert_eq!(outcome.removed_artifacts, 1);
    assert!(project.path("hdr/a_A.h").exists());
    assert!(!project.path("hdr/Stray.h").exists());
}
