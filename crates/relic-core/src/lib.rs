//! # relic-core
//!
//! Core abstractions for the Relic artifact discovery plane.
//!
//! This crate provides the foundational types shared by the indexing engine
//! and the HTTP layer:
//!
//! - **Digests**: Algorithm-prefixed content hashes used as primary identity
//! - **Wire Types**: Image-spec descriptor, index, and manifest shapes
//! - **Attribute Sets**: Schema-grouped attribute triples extracted at ingest
//! - **Canonical JSON**: Deterministic encoding for attribute-value identity
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `relic-core` is the only crate allowed to define shared primitives. It
//! performs no I/O; the index engine and HTTP layer build on top of it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod attributes;
pub mod canonical_json;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use relic_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attributes::AttributeSet;
    pub use crate::descriptor::{Descriptor, ImageIndex, Manifest, Platform};
    pub use crate::digest::Digest;
    pub use crate::error::{Error, Result};
}

pub use error::{Error, Result};
