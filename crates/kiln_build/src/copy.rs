//! A transformer that copies sources into the output root unchanged.
//!
//! Used for resources such as `.properties` files. Copies have no
//! dependencies and no public API, so they never cause propagation.

use std::path::PathBuf;

use kiln_common::PackageName;
use kiln_source::Source;
use rayon::prelude::*;
use tracing::debug;

use crate::error::TransformError;
use crate::transform::{TransformRequest, TransformSink, Transformer};

/// Copies each source to `<output>/<module>/<package dir>/<file name>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransformer;

impl CopyTransformer {
    /// Creates the transformer.
    pub fn new() -> Self {
        Self
    }
}

/// The artifact name and output-relative location of a copied source.
fn artifact_name(package: &PackageName, source: &Source) -> String {
    let file = source
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut parts = Vec::new();
    if !package.module().is_empty() {
        parts.push(package.module().to_string());
    }
    if !package.package().is_empty() {
        parts.push(package.package_dir());
    }
    parts.push(file);
    parts.join("/")
}

impl Transformer for CopyTransformer {
    fn kind(&self) -> &'static str {
        "copy"
    }

    fn accepts(&self, _suffix: &str) -> bool {
        true
    }

    fn transform(&self, request: &TransformRequest<'_>, sink: &TransformSink) -> Result<(), TransformError> {
        request.pool.install(|| {
            request
                .packages
                .par_iter()
                .try_for_each(|(package, sources)| {
                    sink.mark_compiled(package);
                    for source in sources {
                        let name = artifact_name(package, source);
                        let dest: PathBuf = request.output.join(&name);
                        if let Some(parent) = dest.parent() {
                            std::fs::create_dir_all(parent).map_err(|e| TransformError::Io {
                                path: parent.to_path_buf(),
                                source: e,
                            })?;
                        }
                        std::fs::copy(source.path(), &dest).map_err(|e| TransformError::Io {
                            path: source.path().to_path_buf(),
                            source: e,
                        })?;
                        debug!(source = source.name(), dest = %dest.display(), "copied");
                        sink.add_artifact(package, name, dest);
                    }
                    Ok(())
                })
        })
    }
}
