//! # relic-api
//!
//! HTTP composition layer for the Relic artifact discovery plane.
//!
//! This crate provides the API surface for the discovery subsystem:
//!
//! - **Routing**: discovery and ingest endpoint configuration
//! - **Service Wiring**: composition of the store, indexer, and query engine
//! - **Observability**: request tracing and health checks
//!
//! ## Design Principles
//!
//! This crate is a thin composition layer with no indexing policy. The
//! projection and query semantics live in `relic-index`.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /health                                        - Health check
//! GET  /ready                                         - Readiness check
//! GET  /api/v1/discovery                              - Attribute/link/digest discovery
//! PUT  /api/v1/repositories/{name}/manifests/{digest} - Manifest ingest hook
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod server;
