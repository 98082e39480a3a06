//! Compilation units and source-tree scanning.
//!
//! This crate provides the [`Source`] type for a single compilation unit and
//! the [`SourceScanner`] that walks configured roots, detects module
//! descriptors, and classifies each file as compiled, link-only, or generated.

#![warn(missing_docs)]

pub mod error;
pub mod scan;
pub mod source;

pub use error::ScanError;
pub use scan::{ModuleInfo, RootKind, SourceRoot, SourceScanner, SourceTree, UNNAMED_MODULE};
pub use source::Source;
