//! API integration tests.
//!
//! Tests the complete request flow: HTTP → routes → engine → store, over an
//! on-disk index in a temporary directory.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use relic_api::server::ServerBuilder;
use relic_core::descriptor::{ANNOTATION_NAMESPACE_HINT, MEDIA_TYPE_IMAGE_MANIFEST};
use relic_core::digest::Digest;
use relic_index::IndexStore;

fn test_router() -> Result<(tempfile::TempDir, axum::Router)> {
    let dir = tempfile::tempdir().context("create index dir")?;
    let store = Arc::new(IndexStore::open(dir.path()).context("open index")?);
    let router = ServerBuilder::new()
        .debug(true)
        .store(store)
        .build()
        .context("build server")?
        .test_router();
    Ok((dir, router))
}

fn manifest_payload(attributes: Option<&serde_json::Value>, links: Option<&serde_json::Value>) -> Vec<u8> {
    let mut annotations = serde_json::Map::new();
    if let Some(attributes) = attributes {
        annotations.insert("uor.attributes".to_string(), json!(attributes.to_string()));
    }
    if let Some(links) = links {
        annotations.insert("uor.link".to_string(), json!(links.to_string()));
    }
    serde_json::to_vec(&json!({
        "schemaVersion": 2,
        "mediaType": MEDIA_TYPE_IMAGE_MANIFEST,
        "annotations": annotations,
    }))
    .expect("manifest payload serializes")
}

/// Percent-encodes a query parameter value.
fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

async fn ingest(router: axum::Router, repository: &str, payload: &[u8]) -> Result<Digest> {
    let digest = Digest::from_bytes(payload);
    let uri = format!(
        "/api/v1/repositories/{}/manifests/{digest}",
        encode(repository)
    );
    let request = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_vec()))
        .context("build ingest request")?;

    let response = router.oneshot(request).await?;
    let status = response.status();
    anyhow::ensure!(status == StatusCode::CREATED, "ingest failed: {status}");
    Ok(digest)
}

async fn get_json(router: axum::Router, uri: &str) -> Result<(StatusCode, serde_json::Value)> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .context("build request")?;
    let response = router.oneshot(request).await?;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .context("read response body")?;
    let json = serde_json::from_slice(&body).with_context(|| {
        format!(
            "parse JSON response (status={status}): {}",
            String::from_utf8_lossy(&body)
        )
    })?;
    Ok((status, json))
}

fn manifest_digests(index: &serde_json::Value) -> BTreeSet<String> {
    index["manifests"]
        .as_array()
        .map(|manifests| {
            manifests
                .iter()
                .filter_map(|m| m["digest"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn health_and_ready_respond() -> Result<()> {
    let (_dir, router) = test_router()?;

    let (status, body) = get_json(router.clone(), "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get_json(router, "/ready").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    Ok(())
}

#[tokio::test]
async fn attribute_discovery_is_conjunctive() -> Result<()> {
    let (_dir, router) = test_router()?;

    let a = ingest(
        router.clone(),
        "acme/app",
        &manifest_payload(Some(&json!({"s": {"color": "red", "size": 10}})), None),
    )
    .await?;
    let b = ingest(
        router.clone(),
        "acme/app",
        &manifest_payload(Some(&json!({"s": {"color": "red", "size": 20}})), None),
    )
    .await?;

    // Shared triple matches both manifests.
    let uri = format!(
        "/api/v1/discovery?attributes={}",
        encode(&json!({"s": {"color": "red"}}).to_string())
    );
    let (status, index) = get_json(router.clone(), &uri).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(index["schemaVersion"], 2);
    let digests = manifest_digests(&index);
    assert!(digests.contains(a.as_str()));
    assert!(digests.contains(b.as_str()));

    // Adding the second triple narrows to the one manifest carrying both.
    let uri = format!(
        "/api/v1/discovery?attributes={}",
        encode(&json!({"s": {"color": "red", "size": 10}}).to_string())
    );
    let (status, index) = get_json(router.clone(), &uri).await?;
    assert_eq!(status, StatusCode::OK);
    let digests = manifest_digests(&index);
    assert!(digests.contains(a.as_str()));
    assert!(!digests.contains(b.as_str()));

    // A value no manifest carries matches nothing.
    let uri = format!(
        "/api/v1/discovery?attributes={}",
        encode(&json!({"s": {"color": "blue"}}).to_string())
    );
    let (status, index) = get_json(router, &uri).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(manifest_digests(&index).is_empty());
    Ok(())
}

#[tokio::test]
async fn attribute_hits_are_enriched_with_namespace_hint() -> Result<()> {
    let (_dir, router) = test_router()?;

    let digest = ingest(
        router.clone(),
        "acme/app",
        &manifest_payload(Some(&json!({"s": {"color": "red"}})), None),
    )
    .await?;

    let uri = format!(
        "/api/v1/discovery?attributes={}",
        encode(&json!({"s": {"color": "red"}}).to_string())
    );
    let (status, index) = get_json(router, &uri).await?;
    assert_eq!(status, StatusCode::OK);

    // Digest enrichment appends the canonical descriptor, which carries the
    // ingesting repository as namespaceHint.
    let hint = index["manifests"]
        .as_array()
        .and_then(|manifests| {
            manifests.iter().find_map(|m| {
                (m["digest"] == json!(digest.as_str()))
                    .then(|| m["annotations"][ANNOTATION_NAMESPACE_HINT].as_str())
                    .flatten()
                    .map(str::to_string)
            })
        })
        .context("namespaceHint present")?;
    assert_eq!(hint, "acme/app");
    Ok(())
}

#[tokio::test]
async fn link_discovery_returns_linker_edges() -> Result<()> {
    let (_dir, router) = test_router()?;

    let target = Digest::from_bytes(b"linked artifact");
    let links = json!([
        {"mediaType": MEDIA_TYPE_IMAGE_MANIFEST, "digest": target.as_str(), "size": 0},
    ]);
    let linker = ingest(
        router.clone(),
        "acme/app",
        &manifest_payload(None, Some(&links)),
    )
    .await?;

    let uri = format!("/api/v1/discovery?links={target}");
    let (status, index) = get_json(router, &uri).await?;
    assert_eq!(status, StatusCode::OK);

    let manifests = index["manifests"].as_array().context("manifests array")?;
    // The link edge surfaces under the linker digest...
    assert!(manifests.iter().any(|m| m["digest"] == json!(target.as_str())));
    // ...and the linker's own canonical descriptor is folded in by stage C.
    assert!(manifests.iter().any(|m| m["digest"] == json!(linker.as_str())));
    Ok(())
}

#[tokio::test]
async fn empty_query_yields_empty_index() -> Result<()> {
    let (_dir, router) = test_router()?;

    let (status, index) = get_json(router, "/api/v1/discovery").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(index["schemaVersion"], 2);
    assert_eq!(index["manifests"], json!([]));
    Ok(())
}

#[tokio::test]
async fn unknown_digests_are_skipped_not_fatal() -> Result<()> {
    let (_dir, router) = test_router()?;

    let known = ingest(
        router.clone(),
        "acme/app",
        &manifest_payload(Some(&json!({"s": {"k": "v"}})), None),
    )
    .await?;
    let unknown = Digest::from_bytes(b"never ingested");

    let uri = format!("/api/v1/discovery?digest={known},{unknown}");
    let (status, index) = get_json(router, &uri).await?;
    assert_eq!(status, StatusCode::OK);

    let digests = manifest_digests(&index);
    assert!(digests.contains(known.as_str()));
    assert!(!digests.contains(unknown.as_str()));
    Ok(())
}

#[tokio::test]
async fn malformed_attributes_parameter_is_rejected() -> Result<()> {
    let (_dir, router) = test_router()?;

    let uri = format!("/api/v1/discovery?attributes={}", encode("{not json"));
    let (status, body) = get_json(router.clone(), &uri).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(
        body["message"]
            .as_str()
            .context("message present")?
            .contains("attributes")
    );

    // Invalid digests in the list parameters are rejected the same way.
    let (status, body) = get_json(router, "/api/v1/discovery?links=nonsense").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn ingest_rejects_mismatched_digest() -> Result<()> {
    let (_dir, router) = test_router()?;

    let payload = manifest_payload(Some(&json!({"s": {"k": "v"}})), None);
    let wrong = Digest::from_bytes(b"a different payload");
    let uri = format!("/api/v1/repositories/acme%2Fapp/manifests/{wrong}");
    let request = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload))
        .context("build request")?;

    let response = router.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await?;
    let body: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(body["code"], "DIGEST_MISMATCH");
    Ok(())
}

#[tokio::test]
async fn concurrent_ingest_and_query_never_observe_partial_state() -> Result<()> {
    let (_dir, router) = test_router()?;

    let payload = manifest_payload(Some(&json!({"s": {"color": "red"}})), None);
    let uri = format!(
        "/api/v1/discovery?attributes={}",
        encode(&json!({"s": {"color": "red"}}).to_string())
    );

    let ingest_task = ingest(router.clone(), "acme/app", &payload);
    let query_task = get_json(router.clone(), &uri);
    let (ingested, queried) = tokio::join!(ingest_task, query_task);
    let digest = ingested?;
    let (status, index) = queried?;
    assert_eq!(status, StatusCode::OK);

    // The racing query sees the manifest fully indexed or not at all; a hit
    // always comes with its enrichment descriptor.
    let digests = manifest_digests(&index);
    if digests.contains(digest.as_str()) {
        let descriptors = index["manifests"].as_array().context("manifests array")?;
        assert!(descriptors.iter().any(|m| {
            m["digest"] == json!(digest.as_str())
                && m["annotations"][ANNOTATION_NAMESPACE_HINT] == json!("acme/app")
        }));
    }

    // After the ingest settles the manifest is always visible.
    let (_, index) = get_json(router, &uri).await?;
    assert!(manifest_digests(&index).contains(digest.as_str()));
    Ok(())
}

#[tokio::test]
async fn repository_names_with_encoded_separators_round_trip() -> Result<()> {
    let (_dir, router) = test_router()?;

    let payload = manifest_payload(Some(&json!({"s": {"k": "v"}})), None);
    let digest = ingest(router.clone(), "team/registry/app", &payload).await?;

    let uri = format!("/api/v1/discovery?digest={digest}");
    let (_, index) = get_json(router, &uri).await?;
    let hint = index["manifests"][0]["annotations"][ANNOTATION_NAMESPACE_HINT]
        .as_str()
        .context("hint present")?;
    assert_eq!(hint, "team/registry/app");
    Ok(())
}
