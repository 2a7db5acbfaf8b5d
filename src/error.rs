//! Error types for provider adapters.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("{0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Connect(String),

    #[error("handshake rejected: {0}")]
    Rejected(String),

    #[error("{provider} is not connected")]
    NotConnected { provider: String },

    #[error("{0}")]
    Transport(String),

    #[error("channel closed")]
    Closed,
}

impl From<tungstenite::Error> for AdapterError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                AdapterError::Closed
            }
            other => AdapterError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
