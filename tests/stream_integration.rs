//! Integration tests for framing over real sockets.
//!
//! These tests run both ends of a connection in-process: one side writes
//! through a `WriterSink`, the other feeds its read half into a
//! `JsonLineStream` with `pump`.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=jsonline=debug cargo test --test stream_integration -- --nocapture
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use jsonline::{
    pump, read_next, DecodeError, JsonLineStream, StreamConfig, StreamError, WriteOptions,
    WriterSink,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Test timeout to prevent hanging tests.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a subscriber once so `RUST_LOG` works in tests.
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "jsonline=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Callback-mode stream that records everything it receives.
fn recording_stream(
    sink: WriterSink,
) -> (
    JsonLineStream<WriterSink>,
    Arc<Mutex<Vec<Value>>>,
    Arc<Mutex<Vec<DecodeError>>>,
) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let on_message = Arc::clone(&messages);
    let on_error = Arc::clone(&errors);

    let config = StreamConfig::new()
        .on_message(move |value: Value| on_message.lock().unwrap().push(value))
        .on_decode_error(move |err| on_error.lock().unwrap().push(err));
    let stream = JsonLineStream::new(sink, config).expect("valid config");
    (stream, messages, errors)
}

#[tokio::test]
async fn test_messages_cross_socket_in_order() {
    init_tracing();
    let (client, server) = UnixStream::pair().expect("Failed to create socket pair");
    let (_client_read, client_write) = client.into_split();
    let (server_read, server_write) = server.into_split();

    let mut writer = JsonLineStream::new(
        WriterSink::spawn(client_write),
        StreamConfig::<Value>::new().write_only(),
    )
    .expect("valid config");

    let sent = vec![
        json!(["the", "data", "here", "café"]),
        json!({"data": "for", "x": "event"}),
        json!({"nested": {"n": 1.5, "ok": true, "none": null}}),
        json!("line\nbreak inside a string"),
    ];
    for value in &sent {
        let flushed = writer
            .write_message(value, WriteOptions::default())
            .expect("encode");
        timeout(TEST_TIMEOUT, flushed)
            .await
            .expect("Test timed out")
            .expect("flush failed");
    }
    timeout(TEST_TIMEOUT, writer.into_sink().shutdown())
        .await
        .expect("Test timed out");

    let (mut reader, messages, errors) = recording_stream(WriterSink::spawn(server_write));
    timeout(TEST_TIMEOUT, pump(server_read, &mut reader))
        .await
        .expect("Test timed out")
        .expect("pump failed");

    assert_eq!(*messages.lock().unwrap(), sent);
    assert!(errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_one_shot_read_over_socket() {
    init_tracing();
    let (client, server) = UnixStream::pair().expect("Failed to create socket pair");
    let (_client_read, mut client_write) = client.into_split();
    let (server_read, server_write) = server.into_split();

    let mut stream = JsonLineStream::new(
        WriterSink::spawn(server_write),
        StreamConfig::<Value>::new().one_shot_reads(),
    )
    .expect("valid config");
    let pending = stream.read_message().expect("read slot free");

    // Deliver the line in awkward pieces, then close
    let writer = tokio::spawn(async move {
        let pieces: [&[u8]; 4] = [b"{\"data\":", b"\"for\",\"x\"", b":\"event\"}", b"\n"];
        for piece in pieces {
            client_write.write_all(piece).await.unwrap();
            client_write.flush().await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    timeout(TEST_TIMEOUT, pump(server_read, &mut stream))
        .await
        .expect("Test timed out")
        .expect("pump failed");
    writer.await.unwrap();

    let value = timeout(TEST_TIMEOUT, pending)
        .await
        .expect("Test timed out")
        .expect("read failed");
    assert_eq!(value, json!({"data": "for", "x": "event"}));
}

#[tokio::test]
async fn test_malformed_line_fails_one_shot_read() {
    init_tracing();
    let (client, server) = UnixStream::pair().expect("Failed to create socket pair");
    let (_client_read, mut client_write) = client.into_split();
    let (server_read, server_write) = server.into_split();

    let mut stream = JsonLineStream::new(
        WriterSink::spawn(server_write),
        StreamConfig::<Value>::new().one_shot_reads(),
    )
    .expect("valid config");
    let pending = stream.read_message().expect("read slot free");

    client_write
        .write_all(b"this is not json\n")
        .await
        .expect("Write failed");
    drop(client_write);

    timeout(TEST_TIMEOUT, pump(server_read, &mut stream))
        .await
        .expect("Test timed out")
        .expect("pump failed");

    let err = timeout(TEST_TIMEOUT, pending)
        .await
        .expect("Test timed out")
        .unwrap_err();
    assert_eq!(err.category(), "decode");
    let decode = err.as_decode().expect("decode payload");
    assert_eq!(decode.line(), "this is not json");
}

#[tokio::test]
async fn test_malformed_line_reaches_error_callback() {
    init_tracing();
    let (client, server) = UnixStream::pair().expect("Failed to create socket pair");
    let (_client_read, mut client_write) = client.into_split();
    let (server_read, server_write) = server.into_split();

    let (mut stream, messages, errors) = recording_stream(WriterSink::spawn(server_write));

    client_write
        .write_all(b"this is not json\n{\"after\":\"bad line\"}\n")
        .await
        .expect("Write failed");
    drop(client_write);

    timeout(TEST_TIMEOUT, pump(server_read, &mut stream))
        .await
        .expect("Test timed out")
        .expect("pump failed");

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line(), "this is not json");
    assert_eq!(*messages.lock().unwrap(), vec![json!({"after": "bad line"})]);
}

#[tokio::test]
async fn test_read_pending_at_eof_is_closed() {
    init_tracing();
    let (client, server) = UnixStream::pair().expect("Failed to create socket pair");
    let (_client_read, mut client_write) = client.into_split();
    let (server_read, server_write) = server.into_split();

    let mut stream = JsonLineStream::new(
        WriterSink::spawn(server_write),
        StreamConfig::<Value>::new().one_shot_reads(),
    )
    .expect("valid config");
    let pending = stream.read_message().expect("read slot free");

    // Undelimited trailing data is never decoded
    client_write.write_all(b"{\"unterminated\":true}").await.unwrap();
    drop(client_write);

    timeout(TEST_TIMEOUT, pump(server_read, &mut stream))
        .await
        .expect("Test timed out")
        .expect("pump failed");

    let err = timeout(TEST_TIMEOUT, pending)
        .await
        .expect("Test timed out")
        .unwrap_err();
    assert!(matches!(err, StreamError::Closed));
}

#[tokio::test]
async fn test_request_response_between_two_streams() {
    init_tracing();
    let (client, server) = UnixStream::pair().expect("Failed to create socket pair");
    let (mut client_read, client_write) = client.into_split();
    let (mut server_read, server_write) = server.into_split();

    // Server: echo every request until the client goes away
    let server_task = tokio::spawn(async move {
        let mut stream = JsonLineStream::new(
            WriterSink::spawn(server_write),
            StreamConfig::<Value>::new().one_shot_reads(),
        )
        .expect("valid config");

        let mut served = 0;
        loop {
            match read_next(&mut server_read, &mut stream).await {
                Ok(request) => {
                    stream
                        .write_message(&json!({"echo": request}), WriteOptions::default())
                        .expect("encode")
                        .await
                        .expect("flush");
                    served += 1;
                }
                Err(StreamError::Closed) => break,
                Err(e) => panic!("server read failed: {}", e),
            }
        }
        served
    });

    let mut client_stream = JsonLineStream::new(
        WriterSink::spawn(client_write),
        StreamConfig::<Value>::new().one_shot_reads(),
    )
    .expect("valid config");

    for n in 0..3 {
        let request = json!({"method": "ping", "seq": n, "note": "héllo"});
        client_stream
            .write_message(&request, WriteOptions::default())
            .expect("encode")
            .await
            .expect("flush");

        let reply = timeout(TEST_TIMEOUT, read_next(&mut client_read, &mut client_stream))
            .await
            .expect("Test timed out")
            .expect("reply");
        assert_eq!(reply, json!({"echo": request}));
    }

    // Closing our write side ends the server loop
    timeout(TEST_TIMEOUT, client_stream.into_sink().shutdown())
        .await
        .expect("Test timed out");
    let served = timeout(TEST_TIMEOUT, server_task)
        .await
        .expect("Test timed out")
        .unwrap();
    assert_eq!(served, 3);
}
