//! End-to-end session tests against an in-process WebSocket server.
//!
//! Each test stands up a one-shot server on a loopback port, scripts the
//! frames the service would send, and checks the callback sequence the
//! session delivers.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use watson_stream::RecognizeError;
use watson_stream::audio::capture_channel;
use watson_stream::recognize::{
    RecognitionOptions, RecognizeCallback, Session, SpeechRecognitionResults, SpeechToText,
};

// =============================================================================
// Test Harness
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Connected,
    Listening,
    Transcription(String),
    InactivityTimeout(String),
    Error(String),
    Complete,
    Disconnected,
}

/// Records every callback in arrival order.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecognizeCallback for Recorder {
    async fn on_connected(&self) {
        self.push(Event::Connected);
    }
    async fn on_listening(&self) {
        self.push(Event::Listening);
    }
    async fn on_transcription(&self, results: SpeechRecognitionResults) {
        let text = results.best_transcript().unwrap_or_default().to_string();
        self.push(Event::Transcription(text));
    }
    async fn on_inactivity_timeout(&self, error: RecognizeError) {
        self.push(Event::InactivityTimeout(error.to_string()));
    }
    async fn on_error(&self, error: RecognizeError) {
        self.push(Event::Error(error.to_string()));
    }
    async fn on_transcription_complete(&self) {
        self.push(Event::Complete);
    }
    async fn on_disconnected(&self) {
        self.push(Event::Disconnected);
    }
}

type ServerWs = WebSocketStream<TcpStream>;

/// Route session logs through the test harness; repeat calls are no-ops.
fn init_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Accept exactly one connection and run `handler` over it; returns the
/// endpoint URL to dial.
async fn serve_once<F, Fut>(handler: F) -> String
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = accept_async(stream).await {
                handler(ws).await;
            }
        }
    });
    format!("ws://{addr}/v1/recognize")
}

fn text(value: &Value) -> Message {
    Message::Text(value.to_string().into())
}

fn transcript_frame(transcript: &str, is_final: bool) -> Value {
    json!({
        "result_index": 0,
        "results": [{
            "final": is_final,
            "alternatives": [{"transcript": transcript, "confidence": 0.9}]
        }]
    })
}

async fn wait(session: Session) {
    tokio::time::timeout(Duration::from_secs(5), session.wait())
        .await
        .expect("session did not finish in time");
}

/// Read frames until the stop control message arrives; returns the number of
/// binary frames and the number of stop messages seen so far.
async fn read_until_stop(server: &mut ServerWs) -> (usize, usize) {
    let mut binary = 0;
    let mut stops = 0;
    while let Some(Ok(msg)) = server.next().await {
        match msg {
            Message::Binary(_) => binary += 1,
            Message::Text(t) => {
                let v: Value = serde_json::from_str(&t).unwrap();
                if v.get("action").and_then(Value::as_str) == Some("stop") {
                    stops += 1;
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    (binary, stops)
}

/// Keep polling until the connection is fully closed; polling past the
/// client's close frame is what lets the library send the close reply.
async fn drain(mut server: ServerWs) {
    while let Some(Ok(_)) = server.next().await {}
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn full_session_delivers_callbacks_in_order() {
    init_logs();
    let url = serve_once(|mut server| async move {
        // first frame must be the start control message
        let first = server.next().await.unwrap().unwrap();
        let start: Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
        assert_eq!(start["action"], "start");
        assert!(start["content-type"].is_string());

        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        let (binary, stops) = read_until_stop(&mut server).await;
        assert!(binary > 0, "expected audio frames before stop");
        assert_eq!(stops, 1);

        server
            .send(text(&transcript_frame("hello", false)))
            .await
            .unwrap();
        server
            .send(text(&transcript_frame("hello world", true)))
            .await
            .unwrap();
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        drain(server).await;
    })
    .await;

    let recorder = Arc::new(Recorder::default());
    let audio = std::io::Cursor::new(vec![0u8; 10_000]);
    let session = SpeechToText::new(url)
        .start_session(audio, RecognitionOptions::default(), recorder.clone())
        .await
        .unwrap();
    wait(session).await;

    assert_eq!(
        recorder.events(),
        vec![
            Event::Connected,
            Event::Listening,
            Event::Transcription("hello".to_string()),
            Event::Transcription("hello world".to_string()),
            Event::Complete,
            Event::Disconnected,
        ]
    );
}

#[tokio::test]
async fn second_state_frame_ends_the_session_and_later_frames_are_ignored() {
    init_logs();
    let url = serve_once(|mut server| async move {
        let _ = server.next().await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        read_until_stop(&mut server).await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        // nothing after the second state frame may reach the callback
        let _ = server.send(text(&transcript_frame("late", true))).await;
        let _ = server.send(text(&json!({"state": "listening"}))).await;
        drain(server).await;
    })
    .await;

    let recorder = Arc::new(Recorder::default());
    let session = SpeechToText::new(url)
        .start_session(
            std::io::Cursor::new(vec![0u8; 64]),
            RecognitionOptions::default(),
            recorder.clone(),
        )
        .await
        .unwrap();
    wait(session).await;

    let events = recorder.events();
    let listening = events.iter().filter(|e| **e == Event::Listening).count();
    let complete = events.iter().filter(|e| **e == Event::Complete).count();
    assert_eq!(listening, 1);
    assert_eq!(complete, 1);
    assert!(!events.iter().any(|e| matches!(e, Event::Transcription(_))));
}

#[tokio::test]
async fn inactivity_timeout_is_classified_and_closes_the_session() {
    init_logs();
    let url = serve_once(|mut server| async move {
        let _ = server.next().await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        server
            .send(text(&json!({"error": "No speech detected for 30s"})))
            .await
            .unwrap();
        drain(server).await;
    })
    .await;

    let recorder = Arc::new(Recorder::default());
    // a source that produces no data but stays open until dropped
    let (capture, source) = capture_channel(1);
    let session = SpeechToText::new(url)
        .start_session(source, RecognitionOptions::default(), recorder.clone())
        .await
        .unwrap();
    wait(session).await;
    drop(capture);

    let events = recorder.events();
    assert!(events.contains(&Event::Connected));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::InactivityTimeout(msg) if msg.contains("No speech detected for")))
    );
    assert!(!events.iter().any(|e| matches!(e, Event::Error(_))));
    assert_eq!(events.last(), Some(&Event::Disconnected));
}

#[tokio::test]
async fn generic_service_error_does_not_end_the_session() {
    init_logs();
    let url = serve_once(|mut server| async move {
        let _ = server.next().await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        read_until_stop(&mut server).await;
        server
            .send(text(&json!({"error": "unable to transcode audio"})))
            .await
            .unwrap();
        // the session must still be live to receive the final result
        server
            .send(text(&transcript_frame("after error", true)))
            .await
            .unwrap();
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        drain(server).await;
    })
    .await;

    let recorder = Arc::new(Recorder::default());
    let session = SpeechToText::new(url)
        .start_session(
            std::io::Cursor::new(vec![1u8; 256]),
            RecognitionOptions::default(),
            recorder.clone(),
        )
        .await
        .unwrap();
    wait(session).await;

    assert_eq!(
        recorder.events(),
        vec![
            Event::Connected,
            Event::Listening,
            Event::Error("service error: unable to transcode audio".to_string()),
            Event::Transcription("after error".to_string()),
            Event::Complete,
            Event::Disconnected,
        ]
    );
}

#[tokio::test]
async fn exhausted_source_sends_exactly_one_stop() {
    init_logs();
    let stops = Arc::new(Mutex::new(0usize));
    let seen = stops.clone();
    let url = serve_once(move |mut server| async move {
        let _ = server.next().await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        let (_, n) = read_until_stop(&mut server).await;
        *seen.lock().unwrap() = n;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        drain(server).await;
    })
    .await;

    let session = SpeechToText::new(url)
        .start_session(
            std::io::Cursor::new(vec![0u8; 8192]),
            RecognitionOptions::default(),
            Arc::new(Recorder::default()),
        )
        .await
        .unwrap();
    wait(session).await;

    assert_eq!(*stops.lock().unwrap(), 1);
}

#[tokio::test]
async fn no_stop_is_sent_when_the_session_closed_before_the_source_ended() {
    init_logs();
    let stops = Arc::new(Mutex::new(0usize));
    let seen = stops.clone();
    let url = serve_once(move |mut server| async move {
        let _ = server.next().await;
        // complete the session immediately, before any audio
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        while let Some(Ok(msg)) = server.next().await {
            if let Message::Text(t) = msg {
                let v: Value = serde_json::from_str(&t).unwrap();
                if v.get("action").and_then(Value::as_str) == Some("stop") {
                    *seen.lock().unwrap() += 1;
                }
            }
        }
    })
    .await;

    // a source that stays open for the whole session
    let (capture, source) = capture_channel(1);
    let session = SpeechToText::new(url)
        .start_session(source, RecognitionOptions::default(), Arc::new(Recorder::default()))
        .await
        .unwrap();
    wait(session).await;
    drop(capture);

    assert_eq!(*stops.lock().unwrap(), 0);
}

#[tokio::test]
async fn blocked_audio_source_does_not_delay_transcript_delivery() {
    init_logs();
    let url = serve_once(|mut server| async move {
        let _ = server.next().await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        // deliver a transcript while the client's source is still pending
        server
            .send(text(&transcript_frame("fast lane", false)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        drain(server).await;
    })
    .await;

    let recorder = Arc::new(Recorder::default());
    let (capture, source) = capture_channel(1);
    let session = SpeechToText::new(url)
        .start_session(source, RecognitionOptions::default(), recorder.clone())
        .await
        .unwrap();

    // the receiver path must dispatch while the sender path is idle
    let deadline = tokio::time::Instant::now() + Duration::from_millis(400);
    loop {
        if recorder
            .events()
            .iter()
            .any(|e| matches!(e, Event::Transcription(t) if t == "fast lane"))
        {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "transcript was held up behind the blocked audio source"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    capture.push(Bytes::from_static(&[0u8; 32])).await.unwrap();
    drop(capture);
    wait(session).await;
}

#[tokio::test]
async fn undecodable_frame_is_fatal_and_later_frames_are_ignored() {
    init_logs();
    let url = serve_once(|mut server| async move {
        let _ = server.next().await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        server.send(Message::Text("not json".into())).await.unwrap();
        // the session is closing; none of these may reach the callback
        let _ = server.send(text(&transcript_frame("late", true))).await;
        let _ = server.send(text(&json!({"error": "boom"}))).await;
        drain(server).await;
    })
    .await;

    let recorder = Arc::new(Recorder::default());
    // a source that stays open, so teardown is driven by the bad frame alone
    let (capture, source) = capture_channel(1);
    let session = SpeechToText::new(url)
        .start_session(source, RecognitionOptions::default(), recorder.clone())
        .await
        .unwrap();
    wait(session).await;
    drop(capture);

    let events = recorder.events();
    assert_eq!(events.len(), 4, "unexpected events: {events:?}");
    assert_eq!(events[0], Event::Connected);
    assert_eq!(events[1], Event::Listening);
    assert!(matches!(&events[2], Event::Error(msg) if msg.contains("malformed")));
    // the completed close handshake the session initiated
    assert_eq!(events[3], Event::Disconnected);
}

#[tokio::test]
async fn connect_failure_reports_one_error_and_nothing_else() {
    init_logs();
    // bind then drop to get a port with no listener
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let recorder = Arc::new(Recorder::default());
    let session = SpeechToText::new(format!("ws://{addr}/v1/recognize"))
        .start_session(
            tokio::io::empty(),
            RecognitionOptions::default(),
            recorder.clone(),
        )
        .await
        .unwrap();
    wait(session).await;

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::Error(msg) if msg.contains("connect")));
}

#[tokio::test]
async fn session_open_flag_tracks_the_connection() {
    init_logs();
    let url = serve_once(|mut server| async move {
        let _ = server.next().await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        read_until_stop(&mut server).await;
        server.send(text(&json!({"state": "listening"}))).await.unwrap();
        drain(server).await;
    })
    .await;

    let (capture, source) = capture_channel(1);
    let session = SpeechToText::new(url)
        .start_session(source, RecognitionOptions::default(), Arc::new(Recorder::default()))
        .await
        .unwrap();

    // wait for the handshake to record the session open
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !session.is_open() {
        assert!(tokio::time::Instant::now() < deadline, "session never opened");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    drop(capture);
    wait(session).await;
}
