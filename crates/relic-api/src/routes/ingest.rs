//! Manifest ingest API route.
//!
//! The registry's manifest-upload pipeline calls this hook after a manifest
//! lands in blob storage; it projects the manifest into the discovery index.
//!
//! ## Routes
//!
//! - `PUT /repositories/{name}/manifests/{digest}` - Index an uploaded manifest
//!
//! Multi-level repository names URL-encode their separators
//! (`acme%2Fapp`), since the name occupies a single path segment.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::put;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use relic_core::digest::Digest;

use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

const MAX_MANIFEST_BYTES: usize = 4 * 1024 * 1024;

/// Response after indexing a manifest.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Digest of the indexed manifest.
    #[schema(value_type = String)]
    pub digest: Digest,
    /// Repository the manifest was ingested from.
    pub repository: String,
}

/// Indexes an uploaded manifest.
///
/// The body must hash to the declared digest; its attributes, links, and
/// canonical descriptor become queryable once the request returns.
#[utoipa::path(
    put,
    path = "/api/v1/repositories/{name}/manifests/{digest}",
    params(
        ("name" = String, Path, description = "Repository name (URL-encoded)"),
        ("digest" = String, Path, description = "Declared manifest digest")
    ),
    responses(
        (status = 201, description = "Manifest indexed", body = IngestResponse),
        (status = 400, description = "Invalid digest or manifest", body = ApiErrorBody),
        (status = 500, description = "Index unavailable", body = ApiErrorBody),
    ),
    tag = "Ingest"
)]
pub(crate) async fn put_manifest(
    State(state): State<Arc<AppState>>,
    Path((name, digest)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let digest = Digest::parse(digest)
        .map_err(|e| ApiError::bad_request(format!("malformed digest: {e}")))?;
    digest
        .verify(&body)
        .map_err(|e| ApiError::digest_mismatch(e.to_string()))?;

    tracing::info!(
        digest = %digest,
        repository = %name,
        size = body.len(),
        "Ingesting manifest"
    );

    let indexer = state.indexer();
    let repository = name.clone();
    let manifest_digest = digest.clone();
    tokio::task::spawn_blocking(move || indexer.ingest(&body, &manifest_digest, &repository))
        .await
        .map_err(|e| ApiError::internal(format!("ingest task failed: {e}")))??;

    tracing::info!(digest = %digest, "Manifest indexed successfully");

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            digest,
            repository: name,
        }),
    ))
}

/// Creates the ingest routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/repositories/:name/manifests/:digest", put(put_manifest))
        .layer(DefaultBodyLimit::max(MAX_MANIFEST_BYTES))
}
