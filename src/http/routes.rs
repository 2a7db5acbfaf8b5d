use super::handlers;
use super::state::AppState;
use super::ws;
use crate::config::CorsConfig;
use axum::{http::HeaderValue, routing::get, Router};
use std::path::Path;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health check
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // Session queries
        .route("/sessions", get(handlers::list_sessions))
        // Live transcription
        .route("/ws/transcribe", get(ws::transcribe));

    match state.config.static_files.dir.as_deref() {
        Some(dir) if Path::new(dir).is_dir() => {
            info!("Serving static files from {}", dir);
            router = router.nest_service("/static", ServeDir::new(dir));
        }
        _ => info!("Static files not mounted - development mode"),
    }

    router
        .layer(cors_layer(&state.config.cors))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Configured origins plus `FRONTEND_URL`, if set
fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let mut origins = cors.allowed_origins.clone();
    if let Ok(frontend) = std::env::var("FRONTEND_URL") {
        origins.push(frontend);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}
