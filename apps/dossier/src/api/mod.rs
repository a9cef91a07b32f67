//! # Dossier HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /entities` - Filtered entity list (`types`, `status`, `search`, `view`)
//! - `POST /entities` - Create an entity
//! - `GET /entities/{key}` - Entity detail, by id or slug
//! - `PUT /entities/{key}` - Update an entity
//! - `DELETE /entities/{key}?confirm=true` - Delete an entity and its edges
//! - `POST /entities/{key}/relationships` - Add an edge from the entity
//! - `DELETE /relationships/{id}` - Remove one edge
//! - `GET /deliverables` - Deliverable feed (`agent`, `type`, `project`, `search`, `status`)
//! - `GET /api/agent-usage` / `POST /api/agent-usage` - Usage rollups / record a run
//! - `GET /api/heartbeats` / `POST /api/heartbeats` - Agent liveness
//!
//! ## Security Configuration
//!
//! - `DOSSIER_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `DOSSIER_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod error;
mod handlers;
mod middleware;
mod types;

pub use error::{ApiError, ApiResult};
pub use middleware::create_rate_limiter;
pub use types::{
    DeleteQuery, DeleteResponse, DeliverableListResponse, EntityCard, EntityKey, EntityListQuery,
    EntityListResponse, EntityRequest, ErrorResponse, HealthResponse, HeartbeatRequest, ListView,
    OkResponse, ProjectOption, RelationshipCreated, RelationshipRequest, UsageQuery,
    UsageRecordRequest,
};

use crate::config::ServerConfig;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use dossier_core::{DossierError, EntityBoard};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the registry board.
#[derive(Clone)]
pub struct AppState {
    pub board: Arc<RwLock<EntityBoard>>,
}

impl AppState {
    #[must_use]
    pub fn new(board: EntityBoard) -> Self {
        Self {
            board: Arc::new(RwLock::new(board)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer.
///
/// - `"*"`: allows all origins
/// - unset: localhost only
/// - otherwise: a comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins.map(str::trim) {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(ALLOWED_METHODS)
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, rate
/// limiting (when `rate_limit > 0`).
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = build_cors_layer(config.cors_origins.as_deref());

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/entities",
            get(handlers::list_entities_handler).post(handlers::create_entity_handler),
        )
        .route(
            "/entities/{key}",
            get(handlers::get_entity_handler)
                .put(handlers::update_entity_handler)
                .delete(handlers::delete_entity_handler),
        )
        .route(
            "/entities/{key}/relationships",
            post(handlers::add_relationship_handler),
        )
        .route(
            "/relationships/{id}",
            delete(handlers::delete_relationship_handler),
        )
        .route("/deliverables", get(handlers::list_deliverables_handler))
        .route(
            "/api/agent-usage",
            get(handlers::usage_handler).post(handlers::record_usage_handler),
        )
        .route(
            "/api/heartbeats",
            get(handlers::heartbeats_handler).post(handlers::heartbeat_handler),
        )
        .fallback(handlers::not_found_handler);

    if config.rate_limit > 0 {
        tracing::info!(
            "Rate limiting enabled: {} requests/second",
            config.rate_limit
        );
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(config.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server. Returns after Ctrl+C once in-flight requests
/// have finished.
pub async fn run_server(
    addr: &str,
    board: EntityBoard,
    config: &ServerConfig,
) -> Result<(), DossierError> {
    let router = create_router(AppState::new(board), config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DossierError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Dossier HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DossierError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            tracing::warn!("Cannot listen for Ctrl+C ({}); serving until killed", e);
            std::future::pending::<()>().await;
        }
    }
}
