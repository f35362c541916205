//! Read-side query operations over the index partitions.
//!
//! Each operation opens one read-only snapshot. Attribute search is
//! disjunctive per triple: a record is emitted for every matched
//! `(schema, key, value)` pair, and the discovery handler performs the
//! conjunctive filter across a digest's records.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use relic_core::canonical_json::to_canonical_string;
use relic_core::descriptor::Descriptor;
use relic_core::digest::Digest;
use relic_core::error::Result;

use crate::store::IndexStore;

/// An attribute query as submitted by a client: schema → key → value.
pub type SubmittedAttributes = BTreeMap<String, BTreeMap<String, Value>>;

/// One attribute-partition hit: a digest carrying a submitted triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    /// Attribute schema the triple belongs to.
    pub schema: String,
    /// Attribute key.
    pub key: String,
    /// Canonical JSON encoding of the attribute value.
    pub value: String,
    /// Digest of the manifest carrying the triple.
    pub digest: Digest,
}

/// Read-only query operations over the discovery index.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<IndexStore>,
}

impl QueryEngine {
    /// Creates a query engine over the shared store handle.
    #[must_use]
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }

    /// Enumerates digests matching each submitted `(schema, key, value)`
    /// triple. Schemas absent from the index yield no records (they are
    /// logged and skipped); within a present schema, absent keys or values
    /// simply match nothing.
    ///
    /// # Errors
    ///
    /// Returns [`relic_core::Error::Storage`] on a read failure and
    /// [`relic_core::Error::InvalidDigest`] when the index holds a digest
    /// that no longer validates.
    pub fn attribute_search(&self, submitted: &SubmittedAttributes) -> Result<Vec<AttributeRecord>> {
        self.store.view(|snap| {
            let mut records = Vec::new();
            for (schema, pairs) in submitted {
                if !snap.schema_exists(schema)? {
                    tracing::debug!(schema = %schema, "schema not indexed; yielding no matches");
                    continue;
                }
                for (key, value) in pairs {
                    let canonical = to_canonical_string(value)?;
                    for raw in snap.attribute_digests(schema, key, canonical.as_bytes())? {
                        let digest = Digest::parse(raw)?;
                        records.push(AttributeRecord {
                            schema: schema.clone(),
                            key: key.clone(),
                            value: canonical.clone(),
                            digest,
                        });
                    }
                }
            }
            Ok(records)
        })
    }

    /// Resolves digests to their canonical descriptors (including the
    /// `namespaceHint` annotation injected at ingest). Digests absent from
    /// the index are logged and skipped; empty input returns empty output.
    ///
    /// # Errors
    ///
    /// Returns [`relic_core::Error::Storage`] on a read failure or
    /// [`relic_core::Error::Serialization`] on a corrupt stored descriptor.
    pub fn digest_resolve(&self, digests: &[Digest]) -> Result<Vec<Descriptor>> {
        if digests.is_empty() {
            return Ok(Vec::new());
        }
        self.store.view(|snap| {
            let mut resolved = Vec::new();
            for digest in digests {
                let documents = snap.descriptors(digest)?;
                if documents.is_empty() {
                    tracing::debug!(digest = %digest, "digest not indexed; skipping");
                    continue;
                }
                for document in documents {
                    let descriptor: Descriptor = serde_json::from_slice(&document)?;
                    resolved.push(descriptor);
                }
            }
            Ok(resolved)
        })
    }

    /// Resolves link targets to the edges pointing at them, keyed by the
    /// linker digest. Targets nothing links to are simply absent from the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`relic_core::Error::Storage`] on a read failure,
    /// [`relic_core::Error::InvalidDigest`] on a corrupt linker digest, or
    /// [`relic_core::Error::Serialization`] on a corrupt stored descriptor.
    pub fn link_resolve(&self, targets: &[Digest]) -> Result<BTreeMap<Digest, Vec<Descriptor>>> {
        let mut links: BTreeMap<Digest, Vec<Descriptor>> = BTreeMap::new();
        if targets.is_empty() {
            return Ok(links);
        }
        self.store.view(|snap| {
            for target in targets {
                let edges = snap.links_for(target)?;
                if edges.is_empty() {
                    tracing::debug!(target = %target, "no links recorded for target");
                    continue;
                }
                for (linker, document) in edges {
                    let linker = Digest::parse(linker)?;
                    let descriptor: Descriptor = serde_json::from_slice(&document)?;
                    links.entry(linker).or_default().push(descriptor);
                }
            }
            Ok(())
        })?;
        Ok(links)
    }
}
