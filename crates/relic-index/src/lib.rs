//! # relic-index
//!
//! The embedded indexing engine behind Relic's discovery plane.
//!
//! Uploaded manifests are projected into three index partitions inside a
//! single ordered, transactional key/value store:
//!
//! - **attributes**: `schema / key / value / digest` existence rows
//! - **digests**: `digest / descriptor` canonical descriptors with the
//!   ingesting repository injected as `namespaceHint`
//! - **links**: `target / linker / descriptor` directional link edges
//!
//! Writes for one attribute schema are atomic; reads run on stable
//! snapshots and never block writers.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod ingest;
pub mod query;
pub mod store;

pub use ingest::Indexer;
pub use query::{AttributeRecord, QueryEngine, SubmittedAttributes};
pub use store::IndexStore;
