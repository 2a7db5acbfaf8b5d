use super::state::AppState;
use crate::session::SessionStats;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub active: usize,
    pub sessions: Vec<SessionStats>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "STT Compare API is running".to_string(),
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
        }),
    )
}

/// GET /sessions
/// Status of every connected client session
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.registry.snapshot().await;

    (
        StatusCode::OK,
        Json(SessionsResponse {
            active: sessions.len(),
            sessions,
        }),
    )
}
