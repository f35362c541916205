//! `OpenAPI` (3.x) specification generation for `relic-api`.

use utoipa::OpenApi;

/// `OpenAPI` documentation for the Relic REST API (`/api/v1/*`).
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relic API",
        version = "0.1.0",
        description = "Attribute-indexed artifact discovery API"
    ),
    paths(
        crate::routes::discovery::discover,
        crate::routes::ingest::put_manifest,
    ),
    components(schemas(
        crate::error::ApiErrorBody,
        crate::routes::ingest::IngestResponse,
    )),
    tags(
        (name = "Discovery", description = "Attribute, link, and digest queries"),
        (name = "Ingest", description = "Manifest indexing hooks"),
    )
)]
pub struct ApiDoc;
