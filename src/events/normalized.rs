use serde::{Deserialize, Serialize};

/// Speaker attribution for a transcript.
///
/// Vendor speaker tokens that map onto a 0-based index become `Index`;
/// anything else is passed through untouched as `Label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Speaker {
    Index(u32),
    Label(String),
}

/// A transcript segment in the shared schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,

    /// Whether the segment is final or subject to revision
    pub is_final: bool,

    pub start_ms: f64,

    pub end_ms: f64,

    /// Absent rather than 0.0 when the vendor reports none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<Speaker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    SpeechStarted,
    SpeechEnded,
    EndOfTurn,
}

/// Output of a provider adapter, before provider attribution.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Transcript(Transcript),
    Lifecycle {
        kind: LifecycleKind,
        status: Option<String>,
    },
    Error(String),
}

/// A message written to the client channel.
///
/// Every variant carries exactly one provider attribution, except
/// session-level errors which carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Transcript {
        provider: String,
        transcript: Transcript,
    },
    Lifecycle {
        provider: String,
        event: LifecycleKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        error: String,
    },
}

impl OutboundMessage {
    /// Attribute an adapter event to its provider
    pub fn attributed(provider: &str, event: ProviderEvent) -> Self {
        let provider = provider.to_string();
        match event {
            ProviderEvent::Transcript(transcript) => OutboundMessage::Transcript {
                provider,
                transcript,
            },
            ProviderEvent::Lifecycle { kind, status } => OutboundMessage::Lifecycle {
                provider,
                event: kind,
                status,
            },
            ProviderEvent::Error(error) => OutboundMessage::Error {
                provider: Some(provider),
                error,
            },
        }
    }

    pub fn provider_error(provider: &str, error: impl Into<String>) -> Self {
        OutboundMessage::Error {
            provider: Some(provider.to_string()),
            error: error.into(),
        }
    }

    pub fn session_error(error: impl Into<String>) -> Self {
        OutboundMessage::Error {
            provider: None,
            error: error.into(),
        }
    }

    pub fn provider(&self) -> Option<&str> {
        match self {
            OutboundMessage::Transcript { provider, .. }
            | OutboundMessage::Lifecycle { provider, .. } => Some(provider),
            OutboundMessage::Error { provider, .. } => provider.as_deref(),
        }
    }
}
