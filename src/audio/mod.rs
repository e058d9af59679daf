//! Audio plumbing: Ogg/Opus encapsulation and capture-to-session bridging.

pub mod capture;
pub mod ogg_opus;

pub use capture::{AudioCapture, CaptureHandle, CaptureSource, capture_channel, spawn_capture};
pub use ogg_opus::{
    HEADER_TYPE_BEGINNING_OF_STREAM, HEADER_TYPE_END_OF_STREAM, HEADER_TYPE_NORMAL, OggOpusFramer,
    build_opus_comment, build_opus_header, write_ogg_page_header,
};
