//! Streaming recognition session.
//!
//! One session owns three tasks on top of the connection:
//!
//! ```text
//! ┌──────────────┐ read  ┌────────────┐ Outbound ┌─────────────┐
//! │ audio source │──────▶│ audio pump │─────────▶│ writer task │──▶ sink
//! └──────────────┘       └────────────┘  (mpsc)  └─────────────┘
//!
//!  stream ──▶ receiver loop ──▶ callback dispatch (arrival order)
//! ```
//!
//! The receiver loop and the audio pump are independent tasks: a source whose
//! read blocks (a live microphone) must never stall transcript delivery. The
//! single piece of state they share is the atomic "open" flag; every
//! close-if-still-open and stop-only-if-open decision goes through it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::error::RecognizeError;
use crate::recognize::builder::SpeechToText;
use crate::recognize::callback::RecognizeCallback;
use crate::recognize::config::{RecognitionOptions, build_stop_message};
use crate::recognize::messages::ServerMessage;

/// Bytes per audio read; chunking is an implementation choice, the server
/// treats the audio as one continuous byte stream.
const AUDIO_CHUNK_SIZE: usize = 4096;

/// Outbound frame channel capacity; bounds memory when the source outpaces
/// the connection.
const OUTBOUND_CAPACITY: usize = 32;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type AudioSource = Box<dyn AsyncRead + Send + Unpin>;

/// Frames queued for the writer task.
enum Outbound {
    Audio(Bytes),
    Stop(String),
    Close,
}

/// A live recognition session.
///
/// The handle is owned by the call that created it; a single session does not
/// support concurrent recognitions. Dropping the handle detaches the session,
/// it does not cancel it: the documented way to end a session early is to
/// close the audio source, which drives the normal stop-and-drain path.
pub struct Session {
    open: Arc<AtomicBool>,
    driver: JoinHandle<()>,
}

impl Session {
    /// Whether the connection is currently recorded open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Await full teardown: connection closed and the sender task joined.
    pub async fn wait(self) {
        let _ = self.driver.await;
    }
}

impl SpeechToText {
    /// Start a streaming recognition session.
    ///
    /// Validates `options` and prepares the connection request, then returns
    /// without awaiting the connection; everything after that is reported
    /// through `callback`. If the connection cannot be opened, `on_error` is
    /// invoked exactly once and `on_connected` never fires. Callers that do
    /// not care about events can pass
    /// [`BaseRecognizeCallback`](crate::recognize::BaseRecognizeCallback).
    pub async fn start_session(
        &self,
        audio: impl AsyncRead + Send + Unpin + 'static,
        options: RecognitionOptions,
        callback: Arc<dyn RecognizeCallback>,
    ) -> Result<Session, RecognizeError> {
        options.validate()?;
        let request = self.build_request(&options).await?;
        let start_json = options.build_start_message()?.to_string();

        let open = Arc::new(AtomicBool::new(false));
        let driver = tokio::spawn(run_session(
            request,
            Box::new(audio) as AudioSource,
            start_json,
            callback,
            open.clone(),
        ));
        Ok(Session { open, driver })
    }
}

/// Session driver: connect, hand-shake, spawn the sender side, then run the
/// receiver loop to completion and join the sender tasks.
async fn run_session(
    request: http::Request<()>,
    source: AudioSource,
    start_json: String,
    callback: Arc<dyn RecognizeCallback>,
    open: Arc<AtomicBool>,
) {
    let (ws, _response) = match connect_async(request).await {
        Ok(ok) => ok,
        Err(e) => {
            error!("failed to connect: {e}");
            callback
                .on_error(RecognizeError::ConnectionFailed(e.to_string()))
                .await;
            return;
        }
    };
    info!("recognition connection established");
    callback.on_connected().await;

    let (mut sink, stream) = ws.split();

    if let Err(e) = sink.send(Message::Text(start_json.into())).await {
        error!("failed to send start message: {e}");
        callback
            .on_error(RecognizeError::SendFailed(e.to_string()))
            .await;
        let _ = sink.send(Message::Close(None)).await;
        callback.on_disconnected().await;
        return;
    }
    debug!("sent start message");
    open.store(true, Ordering::Release);

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(run_writer(
        sink,
        outbound_rx,
        open.clone(),
        callback.clone(),
    ));
    let pump = tokio::spawn(run_audio_pump(
        source,
        outbound_tx.clone(),
        open.clone(),
        callback.clone(),
    ));

    run_receiver(stream, outbound_tx, open.clone(), callback).await;

    let _ = pump.await;
    let _ = writer.await;
    info!("recognition session closed");
}

/// Owns the sink. Audio send failures are fatal; the stop message is
/// best-effort and a failure to deliver it is only logged.
async fn run_writer(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    open: Arc<AtomicBool>,
    callback: Arc<dyn RecognizeCallback>,
) {
    while let Some(frame) = outbound.recv().await {
        match frame {
            Outbound::Audio(data) => {
                if let Err(e) = sink.send(Message::Binary(data)).await {
                    error!("failed to send audio frame: {e}");
                    if open
                        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        callback
                            .on_error(RecognizeError::Transport(e.to_string()))
                            .await;
                    }
                    break;
                }
            }
            Outbound::Stop(json) => {
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!("failed to send stop message: {e}");
                }
            }
            Outbound::Close => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!("failed to send close frame: {e}");
                }
                break;
            }
        }
    }
}

/// Reads the audio source until end-of-stream, queueing binary frames. On
/// exhaustion, sends the stop message only if the connection is still
/// recorded open at that instant.
///
/// A session that ends before the source does (server close, transport
/// failure) must not leave this task parked in a read; the writer dropping
/// the channel receiver is the signal to bail out.
async fn run_audio_pump(
    mut source: AudioSource,
    outbound: mpsc::Sender<Outbound>,
    open: Arc<AtomicBool>,
    callback: Arc<dyn RecognizeCallback>,
) {
    let mut buf = vec![0u8; AUDIO_CHUNK_SIZE];
    loop {
        tokio::select! {
            result = source.read(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = Bytes::copy_from_slice(&buf[..n]);
                    if outbound.send(Outbound::Audio(chunk)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!("audio source read failed: {e}");
                    callback
                        .on_error(RecognizeError::AudioSource(e.to_string()))
                        .await;
                    break;
                }
            },
            _ = outbound.closed() => {
                debug!("session ended before the audio source did");
                return;
            }
        }
    }
    if open.load(Ordering::Acquire) {
        debug!("audio source exhausted; sending stop");
        let _ = outbound
            .send(Outbound::Stop(build_stop_message().to_string()))
            .await;
    }
}

/// Close the connection with the normal-closure code if this call is the one
/// that transitions the session out of the open state.
async fn close_if_open(open: &AtomicBool, outbound: &mpsc::Sender<Outbound>) {
    if open
        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        let _ = outbound.send(Outbound::Close).await;
    }
}

/// Inbound loop: classifies each text frame and dispatches callbacks in wire
/// arrival order. The first `state` frame means the server is listening; the
/// second means recognition is complete, after which the session closes and
/// no further inbound messages are dispatched.
async fn run_receiver(
    mut stream: SplitStream<WsStream>,
    outbound: mpsc::Sender<Outbound>,
    open: Arc<AtomicBool>,
    callback: Arc<dyn RecognizeCallback>,
) {
    let mut state_count: u32 = 0;
    let mut draining = false;

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if draining {
                    debug!("ignoring frame after session close: {text}");
                    continue;
                }
                match ServerMessage::parse(&text) {
                    Ok(ServerMessage::Transcription(results)) => {
                        callback.on_transcription(results).await;
                    }
                    Ok(ServerMessage::Error(message)) => {
                        error!("service error: {message}");
                        callback.on_error(RecognizeError::Service(message)).await;
                    }
                    Ok(ServerMessage::InactivityTimeout(message)) => {
                        warn!("inactivity timeout: {message}");
                        callback
                            .on_inactivity_timeout(RecognizeError::InactivityTimeout(message))
                            .await;
                        close_if_open(&open, &outbound).await;
                        draining = true;
                    }
                    Ok(ServerMessage::State(state)) => {
                        state_count += 1;
                        match state_count {
                            1 => {
                                debug!("server listening (state {state:?})");
                                callback.on_listening().await;
                            }
                            2 => {
                                debug!("recognition complete (state {state:?})");
                                callback.on_transcription_complete().await;
                                close_if_open(&open, &outbound).await;
                                draining = true;
                            }
                            _ => {}
                        }
                    }
                    Err(e) => {
                        error!("undecodable inbound frame: {e}");
                        callback.on_error(e).await;
                        close_if_open(&open, &outbound).await;
                        draining = true;
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                debug!("connection closed: {frame:?}");
                open.store(false, Ordering::Release);
                callback.on_disconnected().await;
                return;
            }
            // Pings are answered by the protocol layer; binary frames carry
            // nothing inbound in this protocol.
            Ok(_) => {}
            Err(e) => {
                if draining {
                    debug!("transport error after session close: {e}");
                    return;
                }
                error!("transport failure: {e}");
                if open.swap(false, Ordering::AcqRel) {
                    callback
                        .on_error(RecognizeError::Transport(e.to_string()))
                        .await;
                }
                // failure and close are distinct terminal events; no
                // disconnect notice on this path
                return;
            }
        }
    }

    debug!("inbound stream ended");
    open.store(false, Ordering::Release);
    callback.on_disconnected().await;
}
