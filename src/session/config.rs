use crate::providers::{ProviderConfig, ProviderKind};
use serde_json::{Map, Value};
use thiserror::Error;

/// Sample rate assumed when the client doesn't send one
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Configuration sent by the client in a `config` control message
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Shared audio sample rate, merged into every provider config
    pub sample_rate: u32,

    /// Per-provider sub-objects, keyed by provider name
    providers: Map<String, Value>,
}

#[derive(Error, Debug)]
pub enum SessionConfigError {
    #[error("configuration must be a JSON object")]
    NotObject,

    #[error("invalid audio sample rate: {0}")]
    InvalidSampleRate(String),
}

impl SessionConfig {
    pub fn from_value(value: Value) -> Result<Self, SessionConfigError> {
        let Value::Object(fields) = value else {
            return Err(SessionConfigError::NotObject);
        };

        let sample_rate = match fields.get("audio").and_then(|audio| audio.get("sampleRate")) {
            None | Some(Value::Null) => DEFAULT_SAMPLE_RATE,
            Some(rate) => rate
                .as_u64()
                .and_then(|rate| u32::try_from(rate).ok())
                .filter(|rate| *rate > 0)
                .ok_or_else(|| SessionConfigError::InvalidSampleRate(rate.to_string()))?,
        };

        Ok(Self {
            sample_rate,
            providers: fields,
        })
    }

    /// The provider's sub-config with the sample rate merged in, or `None`
    /// when no credential was supplied for it
    pub fn provider(&self, provider: ProviderKind) -> Option<ProviderConfig> {
        let Some(Value::Object(settings)) = self.providers.get(provider.name()) else {
            return None;
        };

        let has_key = settings
            .get("apiKey")
            .and_then(Value::as_str)
            .is_some_and(|key| !key.is_empty());
        if !has_key {
            return None;
        }

        let mut resolved = settings.clone();
        resolved.insert("sampleRate".to_string(), Value::from(self.sample_rate));
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sample_rate_merged_into_provider() {
        let config = SessionConfig::from_value(json!({
            "audio": {"sampleRate": 48000},
            "deepgram": {"apiKey": "dg", "model": "nova-3"}
        }))
        .unwrap();

        assert_eq!(config.sample_rate, 48000);
        let deepgram = config.provider(ProviderKind::Deepgram).unwrap();
        assert_eq!(deepgram["apiKey"], "dg");
        assert_eq!(deepgram["model"], "nova-3");
        assert_eq!(deepgram["sampleRate"], 48000);
    }

    #[test]
    fn test_default_sample_rate() {
        let config = SessionConfig::from_value(json!({
            "speechmatics": {"apiKey": "sm"}
        }))
        .unwrap();

        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        let speechmatics = config.provider(ProviderKind::Speechmatics).unwrap();
        assert_eq!(speechmatics["sampleRate"], 16000);
    }

    #[test]
    fn test_missing_or_empty_credentials() {
        let config = SessionConfig::from_value(json!({
            "deepgram": {"apiKey": ""},
            "speechmatics": {"language": "de"}
        }))
        .unwrap();

        assert!(config.provider(ProviderKind::Deepgram).is_none());
        assert!(config.provider(ProviderKind::Speechmatics).is_none());

        let config = SessionConfig::from_value(json!({})).unwrap();
        assert!(config.provider(ProviderKind::Deepgram).is_none());
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(matches!(
            SessionConfig::from_value(json!([1, 2])),
            Err(SessionConfigError::NotObject)
        ));
        assert!(matches!(
            SessionConfig::from_value(json!({"audio": {"sampleRate": "fast"}})),
            Err(SessionConfigError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            SessionConfig::from_value(json!({"audio": {"sampleRate": 0}})),
            Err(SessionConfigError::InvalidSampleRate(_))
        ));
    }
}
