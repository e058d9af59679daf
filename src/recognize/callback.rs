//! Consumer-facing event contract.
//!
//! The session invokes these callbacks from its receiver path, in the causal
//! order described on [`RecognizeCallback`]. Every method has a no-op default
//! body, so implementors override only the events they care about;
//! [`BaseRecognizeCallback`] is the ready-made all-no-op implementation.

use crate::error::RecognizeError;
use crate::recognize::messages::SpeechRecognitionResults;

/// Events delivered over the life of one recognition session.
///
/// Guarantees, per session:
///
/// - `on_connected` fires at most once and precedes every other event.
/// - `on_listening` fires at most once, when the server signals readiness.
/// - `on_transcription` fires zero or more times, preserving wire arrival
///   order; never after `on_transcription_complete`.
/// - `on_inactivity_timeout` fires at most once. The session is ending, but
///   the cause is a benign silence timeout, not a real error.
/// - `on_error` reports connection, transport, service, or parse failures.
/// - `on_transcription_complete` fires at most once and is immediately
///   followed by the session actively closing the connection.
/// - `on_disconnected` fires at most once, on transport-initiated close. It
///   is not guaranteed after a transport failure.
#[async_trait::async_trait]
pub trait RecognizeCallback: Send + Sync {
    /// The underlying connection was established.
    async fn on_connected(&self) {}

    /// The server is ready to receive audio.
    async fn on_listening(&self) {}

    /// An interim or final transcription (or speaker labels) arrived.
    async fn on_transcription(&self, _results: SpeechRecognitionResults) {}

    /// The server ended the session after prolonged silence.
    async fn on_inactivity_timeout(&self, _error: RecognizeError) {}

    /// Something went wrong; see [`RecognizeError`] for the taxonomy.
    async fn on_error(&self, _error: RecognizeError) {}

    /// The server will send no further results for this session.
    async fn on_transcription_complete(&self) {}

    /// The connection closed.
    async fn on_disconnected(&self) {}
}

/// A callback that ignores every event.
///
/// Useful directly when a caller only wants the side effect of streaming, or
/// as the default when no callback is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseRecognizeCallback;

#[async_trait::async_trait]
impl RecognizeCallback for BaseRecognizeCallback {}
