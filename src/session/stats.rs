use super::coordinator::SessionState;
use super::registry::SessionId;
use crate::providers::AdapterState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of one client session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: SessionId,

    pub state: SessionState,

    /// When the client connected
    pub started_at: DateTime<Utc>,

    /// Seconds since the client connected
    pub duration_secs: f64,

    /// Audio frames received from the client
    pub frames_received: u64,

    pub bytes_received: u64,

    /// Frames that arrived while no provider was connected
    pub frames_dropped: u64,

    pub providers: Vec<ProviderStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: &'static str,
    pub state: AdapterState,
}
