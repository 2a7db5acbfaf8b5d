//! Speechmatics real-time API.
//!
//! The real-time endpoint sends word-level `AddPartialTranscript` and
//! `AddTranscript` results, which are grouped into one segment per speaker
//! run. Voice gateways that already emit `AddPartialSegment`/`AddSegment`
//! and speaker turn messages are translated directly. Partial segments are
//! refined until a final one replaces them.

use super::adapter::{Handshake, VendorProtocol};
use super::channel::VendorRequest;
use crate::error::Result;
use crate::events::{LifecycleKind, ProviderEvent, Speaker, Transcript};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const DEFAULT_URL: &str = "wss://eu2.rt.speechmatics.com/v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingPoint {
    Enhanced,
    Standard,
}

impl OperatingPoint {
    /// Unrecognised values fall back to `Enhanced`
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "STANDARD" => OperatingPoint::Standard,
            _ => OperatingPoint::Enhanced,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            OperatingPoint::Enhanced => "enhanced",
            OperatingPoint::Standard => "standard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfUtteranceMode {
    Fixed,
    Adaptive,
    External,
}

impl EndOfUtteranceMode {
    /// Unrecognised values fall back to `External`
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "FIXED" => EndOfUtteranceMode::Fixed,
            "ADAPTIVE" => EndOfUtteranceMode::Adaptive,
            _ => EndOfUtteranceMode::External,
        }
    }
}

/// Options accepted in the client's `speechmatics` config block
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeechmaticsSettings {
    pub api_key: String,
    pub sample_rate: u32,
    pub language: String,
    pub operating_point: String,
    /// Seconds the engine may wait before emitting a final
    pub max_delay: f64,
    pub end_of_utterance_mode: String,
    /// Seconds of silence that end an utterance
    pub end_of_utterance_silence_trigger: f64,
    pub enable_diarization: bool,
    pub speaker_sensitivity: f64,
    pub max_speakers: u32,
    pub prefer_current_speaker: bool,
}

impl Default for SpeechmaticsSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            sample_rate: 16000,
            language: "en".to_string(),
            operating_point: "enhanced".to_string(),
            max_delay: 1.2,
            end_of_utterance_mode: "adaptive".to_string(),
            end_of_utterance_silence_trigger: 0.8,
            enable_diarization: false,
            speaker_sensitivity: 0.5,
            max_speakers: 10,
            prefer_current_speaker: false,
        }
    }
}

/// Messages sent by Speechmatics, keyed by their `message` field
#[derive(Debug, Deserialize)]
#[serde(tag = "message")]
pub enum SpeechmaticsMessage {
    RecognitionStarted {},
    AddPartialTranscript {
        #[serde(default)]
        results: Vec<RecognitionResult>,
    },
    AddTranscript {
        #[serde(default)]
        results: Vec<RecognitionResult>,
    },
    EndOfUtterance {},
    AddPartialSegment {
        #[serde(default)]
        segments: Vec<Segment>,
    },
    AddSegment {
        #[serde(default)]
        segments: Vec<Segment>,
    },
    SpeakerStarted {
        #[serde(default)]
        status: Option<Value>,
    },
    SpeakerEnded {
        #[serde(default)]
        status: Option<Value>,
    },
    EndOfTurn {},
    AudioAdded {},
    Info {},
    Warning {
        #[serde(default)]
        reason: Option<String>,
    },
    EndOfTranscript {},
    Error {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub text: String,

    /// Seconds
    #[serde(default)]
    pub start_time: f64,

    /// Seconds
    #[serde(default)]
    pub end_time: f64,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub speaker_id: Option<Value>,

    /// e.g. `has_final`; ignored for finality
    #[serde(default)]
    pub annotation: Vec<String>,
}

/// One word or punctuation mark of a real-time transcript
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionResult {
    /// `word` or `punctuation`
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub start_time: f64,

    #[serde(default)]
    pub end_time: f64,

    /// Punctuation only: `previous`, `next`, `both` or `none`
    #[serde(default)]
    pub attaches_to: Option<String>,

    #[serde(default)]
    pub alternatives: Vec<ResultAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultAlternative {
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub speaker: Option<String>,
}

/// Segment under construction while grouping words
struct SegmentBuilder {
    text: String,
    start_time: f64,
    end_time: f64,
    speaker: Option<String>,
    confidence_sum: f64,
    scored_words: u32,
    glue_next: bool,
}

impl SegmentBuilder {
    fn new(start_time: f64, speaker: Option<String>) -> Self {
        Self {
            text: String::new(),
            start_time,
            end_time: start_time,
            speaker,
            confidence_sum: 0.0,
            scored_words: 0,
            glue_next: false,
        }
    }

    fn push(&mut self, result: &RecognitionResult, alternative: &ResultAlternative) {
        let punctuation = result.kind == "punctuation";
        let attaches_to = result.attaches_to.as_deref().unwrap_or("previous");
        let glue_previous = punctuation && matches!(attaches_to, "previous" | "both");

        if !self.text.is_empty() && !self.glue_next && !glue_previous {
            self.text.push(' ');
        }
        self.text.push_str(&alternative.content);
        self.glue_next = punctuation && matches!(attaches_to, "next" | "both");
        self.end_time = self.end_time.max(result.end_time);

        if !punctuation {
            if let Some(confidence) = alternative.confidence {
                self.confidence_sum += confidence;
                self.scored_words += 1;
            }
        }
    }

    fn finish(self) -> Segment {
        Segment {
            text: self.text,
            start_time: self.start_time,
            end_time: self.end_time,
            confidence: (self.scored_words > 0)
                .then(|| self.confidence_sum / f64::from(self.scored_words)),
            speaker_id: self.speaker.map(Value::String),
            annotation: Vec::new(),
        }
    }
}

/// Group word-level results into one segment per consecutive speaker run.
/// Punctuation stays with the segment it follows.
pub fn group_results(results: &[RecognitionResult]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<SegmentBuilder> = None;

    for result in results {
        let Some(alternative) = result.alternatives.first() else {
            continue;
        };

        let continues = match &current {
            Some(segment) => result.kind == "punctuation" || segment.speaker == alternative.speaker,
            None => false,
        };
        if !continues {
            if let Some(segment) = current.take() {
                segments.push(segment.finish());
            }
            current = Some(SegmentBuilder::new(
                result.start_time,
                alternative.speaker.clone(),
            ));
        }

        if let Some(segment) = current.as_mut() {
            segment.push(result, alternative);
        }
    }

    segments.extend(current.map(SegmentBuilder::finish));
    segments
}

/// Map `S1`, `S2`, ... onto 0-based indices; other values pass through
pub fn normalize_speaker(speaker: &Value) -> Option<Speaker> {
    match speaker {
        Value::Null => None,
        Value::String(label) => {
            let index = label
                .strip_prefix('S')
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse::<u32>().ok())
                .filter(|n| *n >= 1);
            Some(match index {
                Some(n) => Speaker::Index(n - 1),
                None => Speaker::Label(label.clone()),
            })
        }
        Value::Number(number) => Some(
            number
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Speaker::Index)
                .unwrap_or_else(|| Speaker::Label(number.to_string())),
        ),
        other => Some(Speaker::Label(other.to_string())),
    }
}

fn status_text(status: Option<Value>) -> Option<String> {
    match status? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

pub struct SpeechmaticsProtocol {
    url: String,
}

impl SpeechmaticsProtocol {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn transcripts(segments: Vec<Segment>, is_final: bool) -> Vec<ProviderEvent> {
        segments
            .into_iter()
            .map(|segment| {
                let speaker = segment.speaker_id.as_ref().and_then(normalize_speaker);
                ProviderEvent::Transcript(Transcript {
                    text: segment.text,
                    is_final,
                    start_ms: segment.start_time * 1000.0,
                    end_ms: segment.end_time * 1000.0,
                    // Partial segments never carry confidence
                    confidence: if is_final { segment.confidence } else { None },
                    speaker,
                })
            })
            .collect()
    }
}

impl VendorProtocol for SpeechmaticsProtocol {
    type Settings = SpeechmaticsSettings;
    type Message = SpeechmaticsMessage;

    const NAME: &'static str = "speechmatics";

    fn open_request(&self, settings: &SpeechmaticsSettings) -> Result<VendorRequest> {
        Ok(VendorRequest {
            url: self.url.clone(),
            headers: vec![(
                "Authorization".to_string(),
                format!("Bearer {}", settings.api_key),
            )],
        })
    }

    fn start_messages(&self, settings: &SpeechmaticsSettings) -> Result<Vec<String>> {
        let operating_point = OperatingPoint::parse(&settings.operating_point);
        let eou_mode = EndOfUtteranceMode::parse(&settings.end_of_utterance_mode);

        let mut transcription_config = json!({
            "language": settings.language,
            "operating_point": operating_point.as_str(),
            "max_delay": settings.max_delay,
            "enable_partials": true,
        });

        // External mode leaves turn detection to the client
        if eou_mode != EndOfUtteranceMode::External {
            transcription_config["conversation_config"] = json!({
                "end_of_utterance_silence_trigger": settings.end_of_utterance_silence_trigger,
            });
        }

        if settings.enable_diarization {
            info!(
                "Speechmatics diarization enabled: sensitivity={}, max_speakers={}, \
                 prefer_current={}",
                settings.speaker_sensitivity,
                settings.max_speakers,
                settings.prefer_current_speaker
            );
            transcription_config["diarization"] = json!("speaker");
            transcription_config["speaker_diarization_config"] = json!({
                "speaker_sensitivity": settings.speaker_sensitivity,
                "max_speakers": settings.max_speakers,
                "prefer_current_speaker": settings.prefer_current_speaker,
            });
        }

        let start = json!({
            "message": "StartRecognition",
            "audio_format": {
                "type": "raw",
                "encoding": "pcm_s16le",
                "sample_rate": settings.sample_rate,
            },
            "transcription_config": transcription_config,
        });

        Ok(vec![start.to_string()])
    }

    fn requires_handshake(&self) -> bool {
        true
    }

    fn handshake(&self, message: &SpeechmaticsMessage) -> Handshake {
        match message {
            SpeechmaticsMessage::RecognitionStarted {} => Handshake::Ready,
            SpeechmaticsMessage::Error { reason } => Handshake::Rejected(
                reason
                    .clone()
                    .unwrap_or_else(|| "recognition not started".to_string()),
            ),
            _ => Handshake::Pending,
        }
    }

    fn close_messages(&self, frames_sent: u64) -> Vec<String> {
        vec![json!({"message": "EndOfStream", "last_seq_no": frames_sent}).to_string()]
    }

    fn translate(&self, message: SpeechmaticsMessage) -> Vec<ProviderEvent> {
        match message {
            SpeechmaticsMessage::AddPartialSegment { segments } => {
                Self::transcripts(segments, false)
            }
            SpeechmaticsMessage::AddSegment { segments } => Self::transcripts(segments, true),
            SpeechmaticsMessage::AddPartialTranscript { results } => {
                Self::transcripts(group_results(&results), false)
            }
            SpeechmaticsMessage::AddTranscript { results } => {
                Self::transcripts(group_results(&results), true)
            }
            SpeechmaticsMessage::SpeakerStarted { status } => vec![ProviderEvent::Lifecycle {
                kind: LifecycleKind::SpeechStarted,
                status: status_text(status),
            }],
            SpeechmaticsMessage::SpeakerEnded { status } => vec![ProviderEvent::Lifecycle {
                kind: LifecycleKind::SpeechEnded,
                status: status_text(status),
            }],
            SpeechmaticsMessage::EndOfTurn {} | SpeechmaticsMessage::EndOfUtterance {} => {
                vec![ProviderEvent::Lifecycle {
                    kind: LifecycleKind::EndOfTurn,
                    status: None,
                }]
            }
            SpeechmaticsMessage::Error { reason } => {
                let reason = reason.unwrap_or_else(|| "Unknown error".to_string());
                warn!("Speechmatics reported an error: {}", reason);
                vec![ProviderEvent::Error(format!("Speechmatics error: {}", reason))]
            }
            SpeechmaticsMessage::Warning { reason } => {
                warn!("Speechmatics warning: {}", reason.unwrap_or_default());
                Vec::new()
            }
            SpeechmaticsMessage::RecognitionStarted {}
            | SpeechmaticsMessage::AudioAdded {}
            | SpeechmaticsMessage::Info {}
            | SpeechmaticsMessage::EndOfTranscript {} => Vec::new(),
            SpeechmaticsMessage::Unknown => {
                debug!("Ignoring unknown Speechmatics message");
                Vec::new()
            }
        }
    }
}
