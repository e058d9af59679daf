//! Inbound wire messages.
//!
//! Every inbound text frame is a JSON object classified by which top-level
//! key is present: `results`/`speaker_labels` carry transcription data,
//! `error` carries either a real failure or the specially-prefixed inactivity
//! timeout, and `state` is positional (the first one in a session means the
//! server is listening, the second means recognition is complete).

use serde::{Deserialize, Serialize};

use crate::error::RecognizeError;

/// Fixed prefix the server uses to report an inactivity timeout inside an
/// otherwise ordinary error message.
pub const TIMEOUT_PREFIX: &str = "No speech detected for";

/// A classified inbound frame.
///
/// `State` carries no positional information on its own; the session's
/// receiver loop counts them.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Transcription data: interim/final results and/or speaker labels.
    Transcription(SpeechRecognitionResults),
    /// A real error from the service.
    Error(String),
    /// The server's silence-detection notice.
    InactivityTimeout(String),
    /// A `{"state": ...}` frame.
    State(String),
}

impl ServerMessage {
    /// Classify one inbound text frame.
    ///
    /// Frames that are not valid JSON, or valid JSON with none of the known
    /// top-level keys, are errors; the session treats them as fatal.
    pub fn parse(text: &str) -> Result<Self, RecognizeError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| RecognizeError::MalformedMessage(e.to_string()))?;

        if let Some(error) = value.get("error") {
            let message = error.as_str().unwrap_or_default().to_string();
            if message.starts_with(TIMEOUT_PREFIX) {
                return Ok(Self::InactivityTimeout(message));
            }
            return Ok(Self::Error(message));
        }

        if value.get("results").is_some() || value.get("speaker_labels").is_some() {
            let results: SpeechRecognitionResults = serde_json::from_value(value)
                .map_err(|e| RecognizeError::MalformedMessage(e.to_string()))?;
            return Ok(Self::Transcription(results));
        }

        if let Some(state) = value.get("state") {
            return Ok(Self::State(state.as_str().unwrap_or_default().to_string()));
        }

        Err(RecognizeError::MalformedMessage(format!(
            "no recognized top-level key in frame: {text}"
        )))
    }
}

// =============================================================================
// Transcription Results
// =============================================================================

/// A transcription message: recognition results, speaker labels, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechRecognitionResults {
    /// Index of the first result relative to the whole session.
    #[serde(default)]
    pub result_index: i32,

    /// Recognition results, possibly several per frame.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SpeechRecognitionResult>,

    /// Speaker diarization entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub speaker_labels: Vec<SpeakerLabel>,
}

impl SpeechRecognitionResults {
    /// Best transcript of the most recent result, if any.
    pub fn best_transcript(&self) -> Option<&str> {
        self.results
            .last()
            .and_then(|r| r.alternatives.first())
            .map(|a| a.transcript.as_str())
    }

    /// Whether every result in this frame is final.
    pub fn is_final(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.is_final)
    }
}

/// One recognition result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRecognitionResult {
    /// Whether the server will revise this result further.
    #[serde(rename = "final", default)]
    pub is_final: bool,

    /// Transcription hypotheses, best first.
    #[serde(default)]
    pub alternatives: Vec<SpeechRecognitionAlternative>,

    /// Keyword-spotting matches, keyed by keyword.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords_result: Option<serde_json::Value>,

    /// Word alternatives (confusion network entries).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_alternatives: Option<Vec<WordAlternatives>>,
}

/// A transcription hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRecognitionAlternative {
    /// The transcribed text.
    pub transcript: String,

    /// Confidence score (0.0 to 1.0); absent on interim results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Per-word timing: `[word, start, end]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<(String, f64, f64)>>,

    /// Per-word confidence: `[word, confidence]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_confidence: Option<Vec<(String, f64)>>,
}

/// A confusion-network entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordAlternatives {
    pub start_time: f64,
    pub end_time: f64,
    pub alternatives: Vec<WordAlternative>,
}

/// One word within a confusion-network entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordAlternative {
    pub confidence: f64,
    pub word: String,
}

/// One speaker diarization entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerLabel {
    /// Segment start, seconds.
    pub from: f64,
    /// Segment end, seconds.
    pub to: f64,
    /// Speaker identifier (0, 1, 2, ...).
    pub speaker: i32,
    /// Confidence in this label.
    pub confidence: f64,
    /// Whether this label is final.
    #[serde(rename = "final", default)]
    pub is_final: bool,
}
