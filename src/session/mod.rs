//! Client session management
//!
//! This module provides:
//! - `SessionCoordinator`: one client connection's control and data plane
//! - `SessionRegistry`: process-wide table of active sessions
//! - `SessionConfig`: the client's `config` payload, resolved per provider
//! - `SessionStats`: status snapshots for the HTTP API

mod config;
mod coordinator;
mod registry;
mod stats;

pub use config::{SessionConfig, SessionConfigError, DEFAULT_SAMPLE_RATE};
pub use coordinator::{SessionCoordinator, SessionState};
pub use registry::{SessionHandle, SessionId, SessionRegistry};
pub use stats::{ProviderStatus, SessionStats};
