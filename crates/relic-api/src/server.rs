//! API server implementation.
//!
//! Provides health, ready, and discovery endpoints over the embedded index.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use relic_core::{Error as CoreError, Result};
use relic_index::{IndexStore, Indexer, QueryEngine};

use crate::config::{Config, CorsConfig};

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    store: Arc<IndexStore>,
    indexer: Indexer,
    engine: QueryEngine,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &"<IndexStore>")
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates new application state over an open index store.
    #[must_use]
    pub fn new(config: Config, store: Arc<IndexStore>) -> Self {
        Self {
            config,
            indexer: Indexer::new(Arc::clone(&store)),
            engine: QueryEngine::new(Arc::clone(&store)),
            store,
        }
    }

    /// Returns the manifest indexer.
    #[must_use]
    pub fn indexer(&self) -> Indexer {
        self.indexer.clone()
    }

    /// Returns the query engine.
    #[must_use]
    pub fn engine(&self) -> QueryEngine {
        self.engine.clone()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check that
/// doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Returns 200 OK if the service is ready to accept requests; probes the
/// index with an empty snapshot transaction.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.view(|_| Ok(())) {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("index check failed: {e}")),
            }),
        ),
    }
}

// ============================================================================
// Server
// ============================================================================

/// The Relic API server.
pub struct Server {
    config: Config,
    store: Arc<IndexStore>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("store", &"<IndexStore>")
            .finish()
    }
}

impl Server {
    /// Creates a new server over an open index store.
    #[must_use]
    pub fn new(config: Config, store: Arc<IndexStore>) -> Self {
        Self { config, store }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        let state = Arc::new(AppState::new(self.config.clone(), Arc::clone(&self.store)));

        let cors = self.build_cors_layer();

        Router::new()
            // Health and ready endpoints
            .route("/health", get(health))
            .route("/ready", get(ready))
            // API routes
            .nest("/api/v1", crate::routes::api_v1_routes())
            // Middleware (order matters): trace outermost, then CORS.
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            // Shared state
            .with_state(state)
    }

    /// Builds the CORS layer from configuration.
    fn build_cors_layer(&self) -> CorsLayer {
        let cors_config = &self.config.cors;
        let cors = Self::build_cors_base(cors_config);
        Self::apply_cors_allowed_origins(cors, cors_config)
    }

    fn build_cors_base(cors_config: &CorsConfig) -> CorsLayer {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::HEAD, Method::PUT, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH])
            .max_age(Duration::from_secs(cors_config.max_age_seconds))
    }

    fn apply_cors_allowed_origins(cors: CorsLayer, cors_config: &CorsConfig) -> CorsLayer {
        if cors_config.allowed_origins.is_empty() {
            return cors;
        }

        if cors_config.allowed_origins.len() == 1
            && cors_config.allowed_origins.first().is_some_and(|o| o == "*")
        {
            return cors.allow_origin(Any);
        }

        if cors_config.allowed_origins.iter().any(|origin| origin == "*") {
            tracing::error!(
                origins = ?cors_config.allowed_origins,
                "Invalid CORS config: '*' must be the only allowed origin"
            );
            return cors;
        }

        let mut allowed = Vec::new();
        for origin in &cors_config.allowed_origins {
            match HeaderValue::from_str(origin) {
                Ok(value) => allowed.push(value),
                Err(_) => {
                    tracing::error!(
                        origin = %origin,
                        "Invalid CORS origin; expected a valid HeaderValue"
                    );
                }
            }
        }

        if allowed.is_empty() {
            tracing::warn!("All configured CORS origins were invalid; disabling CORS");
            cors
        } else {
            tracing::info!(origins = ?cors_config.allowed_origins, "CORS configured");
            cors.allow_origin(AllowOrigin::list(allowed))
        }
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the port cannot
    /// be bound.
    pub async fn serve(&self) -> Result<()> {
        self.validate_config()?;

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.create_router();

        tracing::info!(http_port = self.config.http_port, "Starting Relic API server");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| CoreError::storage(format!("failed to bind to {addr}: {e}")))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| CoreError::storage(format!("server error: {e}")))?;

        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// This is useful for integration tests where you want to exercise the
    /// routes without binding to a port.
    #[doc(hidden)]
    #[must_use]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }

    fn validate_config(&self) -> Result<()> {
        // No wildcard CORS outside debug mode.
        if !self.config.debug
            && self.config.cors.allowed_origins.iter().any(|origin| origin == "*")
        {
            return Err(CoreError::InvalidInput(
                "cors.allowed_origins cannot include '*' when debug=false".to_string(),
            ));
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to install shutdown signal handler");
    }
}

/// Builder for constructing a server.
pub struct ServerBuilder {
    config: Config,
    store: Option<Arc<IndexStore>>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            store: None,
        }
    }

    /// Sets the full configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Enables or disables debug mode.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Uses an already-open index store.
    #[must_use]
    pub fn store(mut self, store: Arc<IndexStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the server, opening the index at the configured path when no
    /// store was supplied.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] when the index cannot be opened, or a
    /// configuration error when no index path is available outside debug
    /// mode.
    pub fn build(self) -> Result<Server> {
        let store = match self.store {
            Some(store) => store,
            None => {
                let Some(path) = self.config.index_path.clone() else {
                    return Err(CoreError::InvalidInput(
                        "index_path is required when no store is supplied".to_string(),
                    ));
                };
                Arc::new(IndexStore::open(path)?)
            }
        };
        Ok(Server::new(self.config, store))
    }
}
