//! Manifest ingest: projecting uploaded manifests into the index.
//!
//! Ingest parses the manifest payload, unions the attribute sets found on
//! the manifest, its link descriptors, and its layers, and writes the three
//! index partitions. Each attribute schema gets its own write transaction,
//! so a failure indexing one schema never leaves that schema partially
//! visible and never blocks the other schemas from committing.

use std::sync::Arc;

use relic_core::attributes::AttributeSet;
use relic_core::canonical_json::to_canonical_bytes;
use relic_core::descriptor::{
    ANNOTATION_ATTRIBUTES, ANNOTATION_LINK, Descriptor, Manifest, ANNOTATION_NAMESPACE_HINT,
};
use relic_core::digest::Digest;
use relic_core::error::{Error, Result};

use crate::store::{IndexStore, IndexWriter};

/// Projects uploaded manifests into the attribute, digest, and link
/// partitions.
#[derive(Clone)]
pub struct Indexer {
    store: Arc<IndexStore>,
}

impl Indexer {
    /// Creates an indexer over the shared store handle.
    #[must_use]
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }

    /// Ingests one manifest.
    ///
    /// After success all three partitions reflect the manifest. A malformed
    /// `uor.attributes` annotation on any single source (manifest, link, or
    /// layer) drops that source's attribute group and is logged; the rest of
    /// the manifest is still indexed. Links without a target digest are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ingest`] when the payload is not a manifest, the
    /// digest is invalid, or the `uor.link` annotation is unreadable;
    /// [`Error::Storage`] when a write transaction fails.
    pub fn ingest(&self, payload: &[u8], digest: &Digest, repository: &str) -> Result<()> {
        digest
            .validate()
            .map_err(|e| Error::ingest(format!("manifest digest: {e}")))?;

        let manifest: Manifest = serde_json::from_slice(payload)
            .map_err(|e| Error::ingest(format!("unreadable manifest payload: {e}")))?;

        let links = parse_links(&manifest)?;
        let attributes = collect_attributes(&manifest, &links, digest);

        let descriptor_json = canonical_descriptor(&manifest, payload, digest, repository)?;
        let link_rows = link_rows(&links, digest)?;

        tracing::debug!(
            digest = %digest,
            repository = %repository,
            schemas = attributes.iter().count(),
            links = link_rows.len(),
            "ingesting manifest"
        );

        if attributes.is_empty() {
            // No attributes, but the manifest must still resolve by digest
            // and by link target.
            return self.store.update(|tx| {
                write_shared_rows(tx, digest, &descriptor_json, &link_rows);
                Ok(())
            });
        }

        for (schema, pairs) in attributes.iter() {
            self.store.update(|tx| {
                for (key, value) in pairs {
                    let canonical = to_canonical_bytes(value)?;
                    tx.put_attribute(schema, key, &canonical, digest);
                }
                write_shared_rows(tx, digest, &descriptor_json, &link_rows);
                Ok(())
            })?;
        }
        Ok(())
    }
}

/// Writes the digest and link rows shared by every schema transaction, so
/// each schema's view of the manifest is complete on its own.
fn write_shared_rows(
    tx: &mut IndexWriter<'_>,
    digest: &Digest,
    descriptor_json: &[u8],
    link_rows: &[(Digest, Vec<u8>)],
) {
    tx.put_descriptor(digest, descriptor_json);
    for (target, descriptor_json) in link_rows {
        tx.put_link(target, digest, descriptor_json);
    }
}

/// Parses the `uor.link` annotation into link descriptors.
fn parse_links(manifest: &Manifest) -> Result<Vec<Descriptor>> {
    match manifest.annotations.get(ANNOTATION_LINK) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| Error::ingest(format!("unreadable link annotation: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Unions attribute sets from the manifest annotations, each link
/// descriptor's annotations, and each layer's annotations. A source whose
/// annotation fails to parse is dropped with a warning.
fn collect_attributes(manifest: &Manifest, links: &[Descriptor], digest: &Digest) -> AttributeSet {
    let mut attributes = AttributeSet::default();

    let mut sources = Vec::new();
    if let Some(raw) = manifest.annotations.get(ANNOTATION_ATTRIBUTES) {
        sources.push(("manifest", raw));
    }
    for link in links {
        if let Some(raw) = link.annotations.get(ANNOTATION_ATTRIBUTES) {
            sources.push(("link", raw));
        }
    }
    for layer in &manifest.layers {
        if let Some(raw) = layer.annotations.get(ANNOTATION_ATTRIBUTES) {
            sources.push(("layer", raw));
        }
    }

    for (source, raw) in sources {
        match AttributeSet::from_annotation(raw) {
            Ok(set) => attributes.merge(set),
            Err(error) => {
                tracing::warn!(
                    digest = %digest,
                    source,
                    %error,
                    "dropping unreadable attribute annotation"
                );
            }
        }
    }
    attributes
}

/// Builds the canonical descriptor stored in the digest partition, with the
/// ingesting repository injected as `namespaceHint`.
fn canonical_descriptor(
    manifest: &Manifest,
    payload: &[u8],
    digest: &Digest,
    repository: &str,
) -> Result<Vec<u8>> {
    let mut annotations = manifest.annotations.clone();
    annotations.insert(ANNOTATION_NAMESPACE_HINT.to_string(), repository.to_string());

    let descriptor = Descriptor {
        media_type: manifest.media_type.clone().unwrap_or_default(),
        digest: digest.clone(),
        size: payload.len() as i64,
        annotations,
        platform: None,
        urls: None,
    };
    Ok(serde_json::to_vec(&descriptor)?)
}

/// Serializes link descriptors into `(target, descriptor JSON)` rows,
/// skipping links whose target digest is empty.
fn link_rows(links: &[Descriptor], digest: &Digest) -> Result<Vec<(Digest, Vec<u8>)>> {
    let mut rows = Vec::with_capacity(links.len());
    for link in links {
        if link.digest.is_empty() {
            tracing::debug!(linker = %digest, "skipping link without target digest");
            continue;
        }
        rows.push((link.digest.clone(), serde_json::to_vec(link)?));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest_with_annotations(annotations: serde_json::Value) -> Manifest {
        serde_json::from_value(json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "annotations": annotations,
        }))
        .expect("valid manifest")
    }

    #[test]
    fn collects_attributes_from_all_three_sources() {
        let mut manifest = manifest_with_annotations(json!({
            "uor.attributes": r#"{"s":{"from":"manifest"}}"#,
        }));
        manifest.layers = vec![Descriptor {
            annotations: [(
                ANNOTATION_ATTRIBUTES.to_string(),
                r#"{"s":{"from":"layer"}}"#.to_string(),
            )]
            .into(),
            ..Descriptor::default()
        }];
        let links = vec![Descriptor {
            digest: Digest::from_bytes(b"target"),
            annotations: [(
                ANNOTATION_ATTRIBUTES.to_string(),
                r#"{"s":{"from":"link"}}"#.to_string(),
            )]
            .into(),
            ..Descriptor::default()
        }];

        let attributes = collect_attributes(&manifest, &links, &Digest::from_bytes(b"m"));
        let (_, pairs) = attributes.iter().next().expect("schema present");
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn malformed_source_is_dropped_not_fatal() {
        let manifest = manifest_with_annotations(json!({
            "uor.attributes": "not json",
        }));
        let attributes = collect_attributes(&manifest, &[], &Digest::from_bytes(b"m"));
        assert!(attributes.is_empty());
    }

    #[test]
    fn link_rows_skip_empty_targets() {
        let links = vec![
            Descriptor::default(),
            Descriptor {
                digest: Digest::from_bytes(b"target"),
                ..Descriptor::default()
            },
        ];
        let rows = link_rows(&links, &Digest::from_bytes(b"m")).expect("rows");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn malformed_link_annotation_is_fatal() {
        let manifest = manifest_with_annotations(json!({
            "uor.link": "not json",
        }));
        assert!(matches!(parse_links(&manifest), Err(Error::Ingest { .. })));
    }

    #[test]
    fn canonical_descriptor_injects_namespace_hint() {
        let manifest = manifest_with_annotations(json!({"team": "infra"}));
        let digest = Digest::from_bytes(b"m");
        let bytes =
            canonical_descriptor(&manifest, b"{}", &digest, "acme/app").expect("descriptor");
        let descriptor: Descriptor = serde_json::from_slice(&bytes).expect("valid json");
        assert_eq!(
            descriptor.annotations.get(ANNOTATION_NAMESPACE_HINT),
            Some(&"acme/app".to_string())
        );
        assert_eq!(descriptor.annotations.get("team"), Some(&"infra".to_string()));
        assert_eq!(descriptor.digest, digest);
    }
}
