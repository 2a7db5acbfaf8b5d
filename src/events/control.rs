use serde_json::{Map, Value};
use thiserror::Error;

/// Literal text frame accepted as a stop signal
pub const END_LITERAL: &str = "END";

/// Control message sent by the client as a text frame
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// `{"type": "config", "config": {...}}`
    Config(Value),

    /// `{"type": "stop"}` or the bare `END` literal
    Stop,

    /// A JSON control message of a type we don't handle
    Unknown(Option<String>),
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("control frame is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("control frame is not a JSON object")]
    NotObject,
}

impl ControlMessage {
    /// Parse a text frame. Only JSON objects and the `END` literal are accepted.
    pub fn parse(text: &str) -> Result<Self, ControlError> {
        if text == END_LITERAL {
            return Ok(ControlMessage::Stop);
        }

        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut fields) = value else {
            return Err(ControlError::NotObject);
        };

        let kind = fields
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);

        match kind.as_deref() {
            Some("config") => {
                let config = fields
                    .remove("config")
                    .unwrap_or_else(|| Value::Object(Map::new()));
                Ok(ControlMessage::Config(config))
            }
            Some("stop") => Ok(ControlMessage::Stop),
            _ => Ok(ControlMessage::Unknown(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_config() {
        let msg = ControlMessage::parse(
            r#"{"type":"config",
                "config":{"audio":{"sampleRate":48000},"deepgram":{"apiKey":"k"}}}"#,
        )
        .unwrap();

        assert_eq!(
            msg,
            ControlMessage::Config(json!({
                "audio": {"sampleRate": 48000},
                "deepgram": {"apiKey": "k"}
            }))
        );
    }

    #[test]
    fn test_parse_config_without_body_defaults_to_empty() {
        let msg = ControlMessage::parse(r#"{"type":"config"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Config(json!({})));
    }

    #[test]
    fn test_parse_stop_variants() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"stop"}"#).unwrap(),
            ControlMessage::Stop
        );
        assert_eq!(ControlMessage::parse("END").unwrap(), ControlMessage::Stop);
    }

    #[test]
    fn test_parse_unknown_type() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"ping"}"#).unwrap(),
            ControlMessage::Unknown(Some("ping".to_string()))
        );
        assert_eq!(
            ControlMessage::parse(r#"{"hello":1}"#).unwrap(),
            ControlMessage::Unknown(None)
        );
    }

    #[test]
    fn test_parse_rejects_raw_text() {
        assert!(matches!(
            ControlMessage::parse("end"),
            Err(ControlError::NotJson(_))
        ));
        assert!(matches!(
            ControlMessage::parse("[1,2]"),
            Err(ControlError::NotObject)
        ));
    }
}
