//! Persisted build state and incremental invalidation.
//!
//! This crate holds the dependency-graph model shared by the "prev" and
//! "now" snapshots, the line-tagged state file codec and store, source and
//! artifact change detection, and taint propagation over the package graph.

#![warn(missing_docs)]

pub mod api;
pub mod changes;
pub mod codec;
pub mod error;
pub mod model;
pub mod session;
pub mod store;
pub mod taint;

pub use api::PublicApi;
pub use changes::{diff_sources, SourceChanges};
pub use codec::{parse_state, render_state, ParseError, STATE_VERSION};
pub use error::StateError;
pub use model::{Artifact, BuildState, Module, Package};
pub use session::BuildSession;
pub use store::{DiscardReason, LoadOutcome, StateStore, STATE_FILE};
