//! # Kinship HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `POST /relationships` - Create a relationship for an approved match
//! - `GET  /relationships/{id}/status` - Stage, progress, countdown, checklist
//! - `GET  /relationships/{id}/features` - Unlocked capability set
//! - `POST /relationships/{id}/sign-off` - Record a party's sign-off
//! - `POST /relationships/{id}/withdraw` - Request withdrawal (cooling-off)
//! - `POST /relationships/{id}/end` - External end-of-relationship signal
//! - `POST /relationships/{id}/activity` - Pushed activity counts
//! - `POST /relationships/{id}/refresh` - Change-feed re-evaluation trigger
//! - `GET  /health` - Health check
//! - `GET  /metrics` - Prometheus metrics
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `KINSHIP_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `KINSHIP_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `KINSHIP_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
// Re-export handlers and types for integration tests (via `kinship::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    activity_handler, create_handler, end_handler, features_handler, health_handler,
    metrics_handler, refresh_handler, sign_off_handler, status_handler, withdraw_handler,
};
#[allow(unused_imports)]
pub use types::{
    ActivityRequest, CoolingOffJson, CreateRequest, CreateResponse, EndResponse,
    FeaturesResponse, HealthResponse, RefreshResponse, RequirementJson, SignOffRequest,
    SignOffResponse, StatusResponse, WithdrawRequest, WithdrawResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use kinship_core::{KinshipError, ProgressionEngine, RecordedMetrics};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// The concrete engine the binary runs: any store backend, recorded metrics.
pub type AppEngine = ProgressionEngine<RecordedMetrics>;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the progression engine.
#[derive(Clone)]
pub struct AppState {
    /// The engine owning the store and the metrics recorder.
    pub engine: Arc<RwLock<AppEngine>>,
}

impl AppState {
    /// Create new app state with an engine.
    #[must_use]
    pub fn new(engine: AppEngine) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `KINSHIP_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("KINSHIP_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (KINSHIP_CORS_ORIGINS=*). This is insecure for production!"
            );
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
                tracing::warn!(
                    "CORS: No valid origins in KINSHIP_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No KINSHIP_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. CORS - handles preflight requests
/// 2. Tracing - logs all requests
/// 3. Rate Limiting - protects against DoS (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    // Check if rate limiting is enabled
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    // Check if authentication is enabled
    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "⚠️  API key authentication DISABLED - all endpoints are publicly accessible! \
             Set KINSHIP_API_KEY environment variable to enable authentication."
        );
    }

    // Build base router with routes
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/relationships", post(handlers::create_handler))
        .route("/relationships/{id}/status", get(handlers::status_handler))
        .route(
            "/relationships/{id}/features",
            get(handlers::features_handler),
        )
        .route(
            "/relationships/{id}/sign-off",
            post(handlers::sign_off_handler),
        )
        .route(
            "/relationships/{id}/withdraw",
            post(handlers::withdraw_handler),
        )
        .route("/relationships/{id}/end", post(handlers::end_handler))
        .route(
            "/relationships/{id}/activity",
            post(handlers::activity_handler),
        )
        .route(
            "/relationships/{id}/refresh",
            post(handlers::refresh_handler),
        );

    // Apply authentication middleware (innermost - runs last on request)
    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    // Apply rate limiting middleware
    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    // Apply CORS, body limit, and tracing (outermost layers)
    router
        .layer(axum::extract::DefaultBodyLimit::max(256 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, engine: AppEngine) -> Result<(), KinshipError> {
    let state = AppState::new(engine);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| KinshipError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Kinship HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| KinshipError::Io(format!("Server error: {}", e)))
}
