//! Recognition session configuration.
//!
//! [`RecognitionOptions`] is built once before a session starts and is
//! immutable thereafter. Everything except `model` and `customization_id`
//! serializes into the JSON start message; those two travel as query
//! parameters on the connection URL instead.

use serde::{Deserialize, Serialize};

use crate::error::RecognizeError;

/// Default audio content type: 16 kHz 16-bit little-endian mono PCM.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/l16;rate=16000";

/// Content type for Ogg-encapsulated Opus audio, as produced by
/// [`crate::audio::ogg_opus`].
pub const OGG_OPUS_CONTENT_TYPE: &str = "audio/ogg;codecs=opus";

/// Configuration for one streaming recognition session.
///
/// Plain data; `Default` gives a PCM session with no optional features. All
/// optional fields are omitted from the start message when unset, so the
/// server applies its own defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionOptions {
    /// MIME type of the audio frames, e.g. `audio/l16;rate=16000`.
    #[serde(rename = "content-type")]
    pub content_type: String,

    /// Recognition model name. Sent as the `model` query parameter, not in
    /// the start message.
    #[serde(skip)]
    pub model: Option<String>,

    /// Custom language model id. Sent as the `customization_id` query
    /// parameter, not in the start message; omitted when empty.
    #[serde(skip)]
    pub customization_id: Option<String>,

    /// Deliver interim (still mutable) transcripts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interim_results: Option<bool>,

    /// Include per-word timestamps in results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<bool>,

    /// Include per-word confidence scores in results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_confidence: Option<bool>,

    /// Enable speaker diarization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_labels: Option<bool>,

    /// Keep the session open across multiple utterances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuous: Option<bool>,

    /// Smart formatting of dates, times, numbers and the like.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_formatting: Option<bool>,

    /// Keywords to spot in the audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    /// Minimum confidence for a keyword match to be reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords_threshold: Option<f32>,

    /// Minimum confidence for word alternatives to be reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_alternatives_threshold: Option<f32>,

    /// Seconds of silence after which the server ends the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timeout: Option<i32>,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            model: None,
            customization_id: None,
            interim_results: None,
            timestamps: None,
            word_confidence: None,
            speaker_labels: None,
            continuous: None,
            smart_formatting: None,
            keywords: None,
            keywords_threshold: None,
            word_alternatives_threshold: None,
            inactivity_timeout: None,
        }
    }
}

impl RecognitionOptions {
    /// Check the options before a session starts.
    ///
    /// The only hard requirement is that `content_type` parses as a media
    /// type (`type/subtype` with optional `;key=value` parameters).
    pub fn validate(&self) -> Result<(), RecognizeError> {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        let mut parts = essence.splitn(2, '/');
        let main = parts.next().unwrap_or_default();
        let sub = parts.next().unwrap_or_default();
        if main.is_empty() || sub.is_empty() {
            return Err(RecognizeError::Configuration(format!(
                "content type {:?} does not parse as a media type",
                self.content_type
            )));
        }
        Ok(())
    }

    /// Build the JSON start control message: the serialized options minus
    /// `model`/`customization_id`, plus `"action": "start"`.
    ///
    /// The error arm exists only to satisfy the serializer's signature; a
    /// struct of strings, bools, numbers, and string lists has no failing
    /// serialization.
    pub fn build_start_message(&self) -> Result<serde_json::Value, RecognizeError> {
        let mut msg = serde_json::to_value(self)
            .map_err(|e| RecognizeError::Configuration(format!("unserializable options: {e}")))?;
        msg["action"] = serde_json::Value::from("start");
        Ok(msg)
    }
}

/// The stop control message: `{"action":"stop"}`.
pub fn build_stop_message() -> serde_json::Value {
    serde_json::json!({ "action": "stop" })
}
