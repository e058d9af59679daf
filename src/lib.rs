//! Streaming speech-to-text client for the IBM Watson WebSocket interface.
//!
//! The crate is organized around a single flow: build a
//! [`SpeechToText`](recognize::SpeechToText), start a session with an audio
//! source and a [`RecognizeCallback`](recognize::RecognizeCallback), and
//! receive transcripts as they arrive.
//!
//! - [`recognize`] holds the session machinery: builder, options, wire
//!   messages, and the callback contract.
//! - [`audio`] holds the supporting plumbing: Ogg/Opus encapsulation for
//!   compressed uplink and the capture pipe for live sources.
//! - [`auth`] supplies bearer tokens through the [`auth::CredentialProvider`]
//!   trait; credentials are injected, never compiled in.

pub mod audio;
pub mod auth;
pub mod error;
pub mod recognize;

pub use error::RecognizeError;
