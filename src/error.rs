//! Error types for the streaming recognition client.

use thiserror::Error;

/// Errors surfaced by the streaming recognition client.
///
/// Once a session has been started, errors are never thrown across the
/// asynchronous boundary; they are delivered to the caller through
/// [`RecognizeCallback::on_error`](crate::recognize::RecognizeCallback::on_error)
/// (or `on_inactivity_timeout` for the server's silence-detection notice).
#[derive(Debug, Clone, Error)]
pub enum RecognizeError {
    /// Invalid session configuration (e.g., a content type that does not
    /// parse as a media type).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The WebSocket connection could not be established.
    #[error("failed to connect: {0}")]
    ConnectionFailed(String),

    /// A message could not be written to the connection.
    #[error("failed to send: {0}")]
    SendFailed(String),

    /// The transport failed mid-session.
    #[error("transport error: {0}")]
    Transport(String),

    /// An error reported by the recognition service.
    #[error("service error: {0}")]
    Service(String),

    /// The server detected prolonged silence in the input audio.
    #[error("inactivity timeout: {0}")]
    InactivityTimeout(String),

    /// An inbound frame could not be parsed. Fatal to the session: there is
    /// no way to resynchronize with the server after an undecodable frame.
    #[error("malformed server message: {0}")]
    MalformedMessage(String),

    /// The audio source failed while being read.
    #[error("audio source error: {0}")]
    AudioSource(String),
}
