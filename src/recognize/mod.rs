//! Real-time speech recognition over the Watson WebSocket interface.
//!
//! A session is driven entirely by callbacks once started:
//!
//! 1. The connection opens → [`RecognizeCallback::on_connected`].
//! 2. The start control message configures recognition; the server answers
//!    with its first `state` frame → [`RecognizeCallback::on_listening`].
//! 3. Audio streams from the source on a dedicated sender path while
//!    transcripts arrive on the receiver path →
//!    [`RecognizeCallback::on_transcription`], zero or more times, in wire
//!    arrival order.
//! 4. When the source is exhausted the session sends the stop control
//!    message; the server flushes final results and repeats the `state`
//!    frame → [`RecognizeCallback::on_transcription_complete`], after which
//!    the session closes the connection.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use watson_stream::auth::StaticToken;
//! use watson_stream::recognize::{
//!     BaseRecognizeCallback, RecognitionOptions, SpeechToText,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stt = SpeechToText::new(
//!         "wss://api.us-south.speech-to-text.watson.cloud.ibm.com/v1/recognize",
//!     )
//!     .with_credentials(Arc::new(StaticToken::new(std::env::var("WATSON_TOKEN")?)));
//!
//!     let options = RecognitionOptions {
//!         model: Some("en-US_BroadbandModel".to_string()),
//!         interim_results: Some(true),
//!         ..Default::default()
//!     };
//!
//!     let audio = tokio::fs::File::open("utterance.raw").await?;
//!     let session = stt
//!         .start_session(audio, options, Arc::new(BaseRecognizeCallback))
//!         .await?;
//!     session.wait().await;
//!     Ok(())
//! }
//! ```

mod builder;
mod callback;
mod client;
pub mod config;
pub mod messages;


pub use builder::{LIBRARY_USER_AGENT, SpeechToText};
pub use callback::{BaseRecognizeCallback, RecognizeCallback};
pub use client::Session;
pub use config::{DEFAULT_CONTENT_TYPE, OGG_OPUS_CONTENT_TYPE, RecognitionOptions};
pub use messages::{
    ServerMessage, SpeakerLabel, SpeechRecognitionAlternative, SpeechRecognitionResult,
    SpeechRecognitionResults, TIMEOUT_PREFIX,
};
