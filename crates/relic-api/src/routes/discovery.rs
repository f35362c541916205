//! Artifact discovery API route.
//!
//! Provides the single discovery endpoint: find artifacts by attribute
//! conjunction, by link target, and by digest, returning an image-index
//! document.
//!
//! ## Routes
//!
//! - `GET /discovery` - Query the index
//!
//! The handler runs three stages in fixed order. Stage A turns attribute
//! hits into candidate digests and keeps only digests carrying *every*
//! submitted triple (the per-triple index is disjunctive; the conjunction
//! happens here). Stage B folds in link edges for the requested targets.
//! Stage C resolves every digest gathered so far, plus any explicitly
//! requested, to its canonical descriptor.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use relic_core::canonical_json::to_canonical_string;
use relic_core::descriptor::{Descriptor, ImageIndex};
use relic_core::digest::Digest;
use relic_core::error::Result as CoreResult;
use relic_index::{QueryEngine, SubmittedAttributes};

use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Query parameters for artifact discovery. All optional; an empty query
/// yields an empty index.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DiscoveryParams {
    /// JSON object `{schema: {key: value, …}, …}`; every submitted triple
    /// must be present on a returned digest.
    pub attributes: Option<String>,
    /// Comma-separated digests; returns link edges targeting any of them.
    pub links: Option<String>,
    /// Comma-separated digests to resolve to canonical descriptors.
    pub digest: Option<String>,
}

/// Queries the discovery index.
///
/// Returns an image index whose manifests are the union of attribute
/// matches, link edges, and digest resolutions.
#[utoipa::path(
    get,
    path = "/api/v1/discovery",
    params(DiscoveryParams),
    responses(
        (status = 200, description = "Image index of matching descriptors"),
        (status = 400, description = "Malformed query parameter", body = ApiErrorBody),
        (status = 500, description = "Index unavailable", body = ApiErrorBody),
    ),
    tag = "Discovery"
)]
pub(crate) async fn discover(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DiscoveryParams>,
) -> Result<Json<ImageIndex>, ApiError> {
    let submitted: Option<SubmittedAttributes> = match params.attributes.as_deref() {
        Some(raw) => Some(serde_json::from_str(raw).map_err(|e| {
            ApiError::bad_request(format!("malformed attributes parameter: {e}"))
        })?),
        None => None,
    };
    let link_targets = parse_digest_list(params.links.as_deref(), "links")?;
    let digests = parse_digest_list(params.digest.as_deref(), "digest")?;

    tracing::debug!(
        attribute_schemas = submitted.as_ref().map_or(0, BTreeMap::len),
        link_targets = link_targets.len(),
        digests = digests.len(),
        "Running discovery query"
    );

    let engine = state.engine();
    let index = tokio::task::spawn_blocking(move || {
        build_index(&engine, submitted.as_ref(), &link_targets, &digests)
    })
    .await
    .map_err(|e| {
        if e.is_cancelled() {
            ApiError::from(relic_core::Error::Cancelled)
        } else {
            ApiError::internal(format!("discovery task failed: {e}"))
        }
    })??;

    Ok(Json(index))
}

/// Splits a comma-separated digest list, validating each entry.
fn parse_digest_list(raw: Option<&str>, name: &str) -> Result<Vec<Digest>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let mut digests = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let digest = Digest::parse(part)
            .map_err(|e| ApiError::bad_request(format!("malformed {name} parameter: {e}")))?;
        digests.push(digest);
    }
    Ok(digests)
}

/// Attribute values observed on one digest: schema → key → canonical values.
type ObservedAttributes = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Runs the three discovery stages and assembles the response index.
fn build_index(
    engine: &QueryEngine,
    submitted: Option<&SubmittedAttributes>,
    link_targets: &[Digest],
    digests: &[Digest],
) -> CoreResult<ImageIndex> {
    let mut results: BTreeMap<Digest, Vec<Descriptor>> = BTreeMap::new();

    // Stage A: attribute query and conjunctive filter.
    if let Some(submitted) = submitted {
        for digest in conjunctive_matches(engine, submitted)? {
            results
                .entry(digest.clone())
                .or_default()
                .push(Descriptor::for_manifest(digest));
        }
    }

    // Stage B: link edges for the requested targets.
    if !link_targets.is_empty() {
        for (linker, edges) in engine.link_resolve(link_targets)? {
            results.entry(linker).or_default().extend(edges);
        }
    }

    // Stage C: canonical descriptors for requested digests plus everything
    // gathered so far.
    let mut to_resolve: BTreeSet<Digest> = digests.iter().cloned().collect();
    to_resolve.extend(results.keys().cloned());
    if !to_resolve.is_empty() {
        let to_resolve: Vec<Digest> = to_resolve.into_iter().collect();
        for descriptor in engine.digest_resolve(&to_resolve)? {
            results
                .entry(descriptor.digest.clone())
                .or_default()
                .push(descriptor);
        }
    }

    Ok(ImageIndex::new(results.into_values().flatten().collect()))
}

/// Returns the digests that carry every submitted triple.
fn conjunctive_matches(
    engine: &QueryEngine,
    submitted: &SubmittedAttributes,
) -> CoreResult<Vec<Digest>> {
    let records = engine.attribute_search(submitted)?;

    let mut observed: BTreeMap<Digest, ObservedAttributes> = BTreeMap::new();
    for record in records {
        observed
            .entry(record.digest)
            .or_default()
            .entry(record.schema)
            .or_default()
            .entry(record.key)
            .or_default()
            .push(record.value);
    }

    let required = canonicalize_submitted(submitted)?;
    Ok(observed
        .into_iter()
        .filter(|(_, attributes)| matches(attributes, &required))
        .map(|(digest, _)| digest)
        .collect())
}

/// Re-encodes the submitted values into canonical form once, so the matcher
/// compares byte-exact strings.
fn canonicalize_submitted(
    submitted: &SubmittedAttributes,
) -> CoreResult<BTreeMap<String, Vec<(String, String)>>> {
    let mut required = BTreeMap::new();
    for (schema, pairs) in submitted {
        let entry: &mut Vec<(String, String)> = required.entry(schema.clone()).or_default();
        for (key, value) in pairs {
            entry.push((key.clone(), to_canonical_string(value)?));
        }
    }
    Ok(required)
}

/// The conjunctive matcher: a digest matches when, for every submitted
/// schema, it carries that schema, and for every submitted `(key, value)`
/// within it, one of its observed values for that key is byte-exact equal.
fn matches(
    observed: &ObservedAttributes,
    required: &BTreeMap<String, Vec<(String, String)>>,
) -> bool {
    required.iter().all(|(schema, pairs)| {
        observed.get(schema).is_some_and(|keys| {
            pairs.iter().all(|(key, value)| {
                keys.get(key).is_some_and(|values| values.contains(value))
            })
        })
    })
}

/// Creates the discovery routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/discovery", get(discover))
}
