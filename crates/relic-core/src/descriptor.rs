//! Image-spec wire types.
//!
//! The registry treats the image-spec descriptor and index shapes as a fixed
//! wire format; this module models the subset the discovery plane reads and
//! produces. Annotation maps use `BTreeMap` so encoded output is
//! deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Media type of an image index document.
pub const MEDIA_TYPE_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Media type of an image manifest document.
pub const MEDIA_TYPE_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Annotation key carrying an attribute set (JSON object keyed by schema).
pub const ANNOTATION_ATTRIBUTES: &str = "uor.attributes";

/// Annotation key carrying link descriptors (JSON array of descriptors).
pub const ANNOTATION_LINK: &str = "uor.link";

/// Annotation key injected at ingest identifying the ingesting repository.
pub const ANNOTATION_NAMESPACE_HINT: &str = "namespaceHint";

/// A content descriptor identifying a manifest or blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    #[serde(default)]
    pub media_type: String,
    /// Digest of the referenced content.
    #[serde(default)]
    pub digest: Digest,
    /// Size of the referenced content in bytes.
    #[serde(default)]
    pub size: i64,
    /// Arbitrary string annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Platform constraints, when the content is platform-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Alternate URLs the content can be fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

impl Descriptor {
    /// Creates a bare image-manifest descriptor for a digest, as seeded by
    /// attribute query hits.
    #[must_use]
    pub fn for_manifest(digest: Digest) -> Self {
        Self {
            media_type: MEDIA_TYPE_IMAGE_MANIFEST.to_string(),
            digest,
            ..Self::default()
        }
    }
}

/// Platform constraints carried by a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    /// CPU architecture (e.g. `amd64`).
    pub architecture: String,
    /// Operating system (e.g. `linux`).
    pub os: String,
    /// Architecture variant (e.g. `v8`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// An image index: the discovery response shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    /// Image-spec schema version; always `2`.
    pub schema_version: i32,
    /// Media type of the index document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Descriptors surfaced by the query.
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
}

impl ImageIndex {
    /// Creates a version-2 index over the given descriptors.
    #[must_use]
    pub fn new(manifests: Vec<Descriptor>) -> Self {
        Self {
            schema_version: 2,
            media_type: None,
            manifests,
        }
    }
}

/// The subset of an image manifest consumed at ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Image-spec schema version.
    #[serde(default)]
    pub schema_version: i32,
    /// Media type of the manifest document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Configuration object descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Descriptor>,
    /// Layer descriptors; per-layer annotations contribute attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<Descriptor>,
    /// Manifest annotations; the carrier for `uor.attributes` and `uor.link`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}
