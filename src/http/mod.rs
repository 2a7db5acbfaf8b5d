//! HTTP and WebSocket API
//!
//! - GET /ws/transcribe - Live transcription session (WebSocket)
//! - GET /sessions - Status of connected sessions
//! - GET /health - Health check
//! - GET / - Service banner
//! - /static - Frontend build, when configured

mod handlers;
mod routes;
mod state;
mod ws;

pub use routes::create_router;
pub use state::AppState;
