//! Capture-to-session plumbing.
//!
//! [`start_session`](crate::recognize::SpeechToText::start_session) takes any
//! `AsyncRead` source. Files already are one; live capture devices are not.
//! [`capture_channel`] bridges the gap: the producing side pushes raw chunks
//! as they come off the device, the consuming side is an `AsyncRead` the
//! session pumps from. Closing the producer is the end-of-stream signal and
//! drives the session's normal stop-and-drain path.
//!
//! Devices that expose a blocking `std::io::Read` (most OS capture APIs) go
//! through [`spawn_capture`], which moves the blocking reads onto the
//! blocking thread pool.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RecognizeError;

/// Create a capture pipe with room for `capacity` in-flight chunks.
///
/// The bound applies backpressure to the producer when the session falls
/// behind; pick it from the device's chunk cadence (a capacity of 32 absorbs
/// several seconds of 20 ms frames).
pub fn capture_channel(capacity: usize) -> (AudioCapture, CaptureSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        AudioCapture { tx },
        CaptureSource {
            rx,
            pending: Bytes::new(),
        },
    )
}

/// Producing half of a capture pipe.
///
/// Drop it (or let it fall out of scope) to signal end-of-stream to the
/// session.
pub struct AudioCapture {
    tx: mpsc::Sender<Bytes>,
}

impl AudioCapture {
    /// Push one chunk of raw audio, waiting if the pipe is full.
    ///
    /// Fails once the consuming side is gone, which means the session has
    /// already ended; producers should stop capturing at that point.
    pub async fn push(&self, chunk: Bytes) -> Result<(), RecognizeError> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| RecognizeError::AudioSource("capture consumer dropped".to_string()))
    }

    /// Whether the consuming side is still attached.
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Consuming half of a capture pipe: an `AsyncRead` over the pushed chunks.
pub struct CaptureSource {
    rx: mpsc::Receiver<Bytes>,
    pending: Bytes,
}

impl AsyncRead for CaptureSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pending.is_empty() {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => self.pending = chunk,
                // channel closed: clean end-of-stream
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
        let n = self.pending.len().min(buf.remaining());
        buf.put_slice(&self.pending.split_to(n));
        Poll::Ready(Ok(()))
    }
}

/// Handle to a capture task started with [`spawn_capture`].
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    /// Request the capture loop to stop after its current read.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop and wait for the capture task to finish.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}

/// Drive a blocking capture device from the blocking thread pool.
///
/// Reads `chunk_size` bytes at a time from `device` and pushes each chunk
/// through `capture` until the device reports end-of-stream, the read fails,
/// the consumer goes away, or [`CaptureHandle::stop`] is called. The producer
/// is dropped when the loop ends, so the session sees end-of-stream and
/// finishes normally.
pub fn spawn_capture<R>(mut device: R, capture: AudioCapture, chunk_size: usize) -> CaptureHandle
where
    R: io::Read + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let task = tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; chunk_size];
        while !stop_flag.load(Ordering::Acquire) {
            match device.read(&mut buf) {
                Ok(0) => {
                    debug!("capture device reported end-of-stream");
                    break;
                }
                Ok(n) => {
                    let chunk = Bytes::copy_from_slice(&buf[..n]);
                    if capture.tx.blocking_send(chunk).is_err() {
                        debug!("capture consumer gone; stopping device reads");
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("capture device read failed: {e}");
                    break;
                }
            }
        }
    });
    CaptureHandle { stop, task }
}
