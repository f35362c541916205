//! HTTP route handlers.

pub mod discovery;
pub mod ingest;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// `/api/v1` routes.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(discovery::routes())
        .merge(ingest::routes())
}
