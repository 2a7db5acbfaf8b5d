//! Deepgram live transcription (`/v1/listen`).
//!
//! Word/utterance oriented: each `Results` message carries one utterance
//! with its own `is_final` flag and timing in seconds.

use super::adapter::VendorProtocol;
use super::channel::VendorRequest;
use crate::error::Result;
use crate::events::{ProviderEvent, Speaker, Transcript};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

pub const DEFAULT_URL: &str = "wss://api.deepgram.com/v1/listen";

/// Options accepted in the client's `deepgram` config block
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeepgramSettings {
    #[serde(rename = "apiKey")]
    pub api_key: String,

    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,

    pub model: String,

    pub language: String,

    pub punctuate: bool,

    pub interim_results: bool,

    /// Silence in milliseconds before an utterance is finalized, or `false`
    pub endpointing: Endpointing,

    pub vad_events: bool,

    pub smart_format: bool,

    pub filler_words: bool,

    pub numerals: bool,

    pub diarize: bool,
}

impl Default for DeepgramSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            sample_rate: 16000,
            model: "nova-2".to_string(),
            language: "en".to_string(),
            punctuate: true,
            interim_results: true,
            endpointing: Endpointing::Millis(300),
            vad_events: true,
            smart_format: true,
            filler_words: false,
            numerals: true,
            diarize: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Endpointing {
    Millis(u32),
    Enabled(bool),
}

impl fmt::Display for Endpointing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpointing::Millis(ms) => write!(f, "{}", ms),
            Endpointing::Enabled(enabled) => write!(f, "{}", enabled),
        }
    }
}

/// Messages sent by Deepgram, keyed by their `type` field
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum DeepgramMessage {
    Results(ResultsMessage),
    Metadata {},
    SpeechStarted {},
    UtteranceEnd {},
    Error {
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct ResultsMessage {
    pub channel: Channel,

    #[serde(default)]
    pub is_final: bool,

    /// Seconds from the start of the stream
    #[serde(default)]
    pub start: Option<f64>,

    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub speaker: Option<u32>,

    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
pub struct Word {
    #[serde(default)]
    pub speaker: Option<u32>,
}

pub struct DeepgramProtocol {
    url: String,
}

impl DeepgramProtocol {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn query(settings: &DeepgramSettings) -> String {
        let flag = |enabled: bool| if enabled { "true" } else { "false" };

        let mut params = vec![
            ("encoding", "linear16".to_string()),
            ("sample_rate", settings.sample_rate.to_string()),
            ("channels", "1".to_string()),
            ("model", settings.model.clone()),
            ("language", settings.language.clone()),
            ("punctuate", flag(settings.punctuate).to_string()),
            ("interim_results", flag(settings.interim_results).to_string()),
            ("endpointing", settings.endpointing.to_string()),
            ("vad_events", flag(settings.vad_events).to_string()),
            ("smart_format", flag(settings.smart_format).to_string()),
            ("filler_words", flag(settings.filler_words).to_string()),
            ("numerals", flag(settings.numerals).to_string()),
            ("diarize", flag(settings.diarize).to_string()),
        ];

        // Utterances carry word-level speaker tags
        if settings.diarize {
            params.push(("utterances", "true".to_string()));
        }

        params
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn transcript(results: ResultsMessage) -> Option<Transcript> {
        let alternative = results.channel.alternatives.into_iter().next()?;
        if alternative.transcript.is_empty() {
            return None;
        }

        let start_ms = results.start.unwrap_or(0.0) * 1000.0;
        let end_ms = start_ms + results.duration.unwrap_or(0.0) * 1000.0;

        let speaker = alternative
            .speaker
            .or_else(|| most_common_speaker(&alternative.words))
            .map(Speaker::Index);

        Some(Transcript {
            text: alternative.transcript,
            is_final: results.is_final,
            start_ms,
            end_ms,
            confidence: alternative.confidence,
            speaker,
        })
    }
}

/// The speaker tagged on the most words; ties go to the first one seen
pub fn most_common_speaker(words: &[Word]) -> Option<u32> {
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for speaker in words.iter().filter_map(|word| word.speaker) {
        match counts.iter_mut().find(|(seen, _)| *seen == speaker) {
            Some((_, count)) => *count += 1,
            None => counts.push((speaker, 1)),
        }
    }

    let mut best: Option<(u32, usize)> = None;
    for (speaker, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((speaker, count));
        }
    }
    best.map(|(speaker, _)| speaker)
}

impl VendorProtocol for DeepgramProtocol {
    type Settings = DeepgramSettings;
    type Message = DeepgramMessage;

    const NAME: &'static str = "deepgram";

    fn open_request(&self, settings: &DeepgramSettings) -> Result<VendorRequest> {
        Ok(VendorRequest {
            url: format!("{}?{}", self.url, Self::query(settings)),
            headers: vec![(
                "Authorization".to_string(),
                format!("Token {}", settings.api_key),
            )],
        })
    }

    fn close_messages(&self, _frames_sent: u64) -> Vec<String> {
        vec![r#"{"type":"CloseStream"}"#.to_string()]
    }

    fn translate(&self, message: DeepgramMessage) -> Vec<ProviderEvent> {
        match message {
            DeepgramMessage::Results(results) => Self::transcript(results)
                .map(ProviderEvent::Transcript)
                .into_iter()
                .collect(),
            DeepgramMessage::Error { description } => {
                let description = description.unwrap_or_else(|| "Unknown error".to_string());
                warn!("Deepgram reported an error: {}", description);
                vec![ProviderEvent::Error(format!("Deepgram error: {}", description))]
            }
            DeepgramMessage::Metadata {}
            | DeepgramMessage::SpeechStarted {}
            | DeepgramMessage::UtteranceEnd {} => Vec::new(),
            DeepgramMessage::Unknown => {
                debug!("Ignoring unknown Deepgram message");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(json: &str) -> Vec<ProviderEvent> {
        let message: DeepgramMessage = serde_json::from_str(json).unwrap();
        DeepgramProtocol::new(DEFAULT_URL).translate(message)
    }

    fn single_transcript(json: &str) -> Transcript {
        match translate(json).as_slice() {
            [ProviderEvent::Transcript(transcript)] => transcript.clone(),
            other => panic!("expected one transcript, got {:?}", other),
        }
    }

    #[test]
    fn test_timing_converted_to_milliseconds() {
        let transcript = single_transcript(
            r#"{"type":"Results","start":1.0,"duration":0.5,"is_final":true,
                "channel":{"alternatives":[{"transcript":"hello world","confidence":0.98}]}}"#,
        );

        assert_eq!(transcript.start_ms, 1000.0);
        assert_eq!(transcript.end_ms, 1500.0);
        assert!(transcript.is_final);
        assert_eq!(transcript.confidence, Some(0.98));
        assert_eq!(transcript.text, "hello world");
    }

    #[test]
    fn test_interim_result_is_not_final() {
        let transcript = single_transcript(
            r#"{"type":"Results","start":0.0,"duration":0.2,"is_final":false,
                "channel":{"alternatives":[{"transcript":"hel"}]}}"#,
        );

        assert!(!transcript.is_final);
        assert_eq!(transcript.confidence, None);
    }

    #[test]
    fn test_empty_transcript_suppressed() {
        let events = translate(
            r#"{"type":"Results","start":1.0,"duration":0.5,"is_final":true,
                "channel":{"alternatives":[{"transcript":"","confidence":0.0}]}}"#,
        );
        assert!(events.is_empty());

        let events = translate(r#"{"type":"Results","channel":{"alternatives":[]}}"#);
        assert!(events.is_empty());
    }

    #[test]
    fn test_speaker_from_most_common_word_speaker() {
        let transcript = single_transcript(
            r#"{"type":"Results","start":0,"duration":1,"is_final":true,
                "channel":{"alternatives":[{"transcript":"a b c","words":[
                    {"word":"a","speaker":1},{"word":"b","speaker":1},{"word":"c","speaker":2}
                ]}]}}"#,
        );
        assert_eq!(transcript.speaker, Some(Speaker::Index(1)));
    }

    #[test]
    fn test_alternative_speaker_takes_precedence() {
        let transcript = single_transcript(
            r#"{"type":"Results","start":0,"duration":1,"is_final":true,
                "channel":{"alternatives":[{"transcript":"a b","speaker":3,"words":[
                    {"word":"a","speaker":0},{"word":"b","speaker":0}
                ]}]}}"#,
        );
        assert_eq!(transcript.speaker, Some(Speaker::Index(3)));
    }

    #[test]
    fn test_speaker_tie_goes_to_first_seen() {
        let words = vec![
            Word { speaker: Some(2) },
            Word { speaker: Some(0) },
            Word { speaker: Some(0) },
            Word { speaker: Some(2) },
        ];
        assert_eq!(most_common_speaker(&words), Some(2));
        assert_eq!(most_common_speaker(&[Word { speaker: None }]), None);
    }

    #[test]
    fn test_error_message() {
        let events = translate(r#"{"type":"Error","description":"bad audio"}"#);
        assert_eq!(
            events,
            vec![ProviderEvent::Error("Deepgram error: bad audio".to_string())]
        );

        let events = translate(r#"{"type":"Error"}"#);
        assert_eq!(
            events,
            vec![ProviderEvent::Error("Deepgram error: Unknown error".to_string())]
        );
    }

    #[test]
    fn test_metadata_and_vad_messages_not_forwarded() {
        assert!(translate(r#"{"type":"Metadata","request_id":"x"}"#).is_empty());
        assert!(translate(r#"{"type":"SpeechStarted","timestamp":1.2}"#).is_empty());
        assert!(translate(r#"{"type":"UtteranceEnd","last_word_end":2.0}"#).is_empty());
        assert!(translate(r#"{"type":"SomethingNew"}"#).is_empty());
    }

    #[test]
    fn test_default_query_parameters() {
        let settings: DeepgramSettings =
            serde_json::from_value(serde_json::json!({"apiKey": "secret", "sampleRate": 48000}))
                .unwrap();
        let request = DeepgramProtocol::new(DEFAULT_URL)
            .open_request(&settings)
            .unwrap();

        assert_eq!(
            request.url,
            "wss://api.deepgram.com/v1/listen?encoding=linear16&sample_rate=48000&channels=1\
             &model=nova-2&language=en&punctuate=true&interim_results=true&endpointing=300\
             &vad_events=true&smart_format=true&filler_words=false&numerals=true&diarize=false"
        );
        assert_eq!(
            request.headers,
            vec![("Authorization".to_string(), "Token secret".to_string())]
        );
    }

    #[test]
    fn test_diarize_adds_utterances() {
        let settings: DeepgramSettings = serde_json::from_value(serde_json::json!({
            "apiKey": "k", "diarize": true, "endpointing": false, "model": "nova-3"
        }))
        .unwrap();
        let request = DeepgramProtocol::new(DEFAULT_URL)
            .open_request(&settings)
            .unwrap();

        assert!(request.url.contains("diarize=true&utterances=true"));
        assert!(request.url.contains("endpointing=false"));
        assert!(request.url.contains("model=nova-3"));
    }

    #[test]
    fn test_invalid_option_rejected() {
        let result: std::result::Result<DeepgramSettings, _> =
            serde_json::from_value(serde_json::json!({"apiKey": "k", "punctuate": "yes"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_close_stream_message() {
        let protocol = DeepgramProtocol::new(DEFAULT_URL);
        assert_eq!(protocol.close_messages(10), vec![r#"{"type":"CloseStream"}"#]);
    }
}
