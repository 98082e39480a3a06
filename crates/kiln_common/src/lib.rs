//! Shared foundational types used across the kiln build coordinator.
//!
//! This crate provides module-qualified package names, content hashing for
//! public-API digests, and millisecond timestamp helpers.

#![warn(missing_docs)]

pub mod hash;
pub mod name;
pub mod time;

pub use hash::ContentHash;
pub use name::PackageName;
pub use time::{modified_millis, to_millis, Millis};
