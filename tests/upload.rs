//! Upload session integration tests
//!
//! Drives the session state machine with scripted transports: framing,
//! Content-Length exactness, the connect bound, and the quiet-period
//! response timeout.

use std::time::{Duration, Instant};

use pushtalk::clip::{ClipWriter, FinalizedClip};
use pushtalk::config::{AudioConfig, UploadConfig};
use pushtalk::upload::{ConnectionState, UploadSession};
use pushtalk::Error;

mod common;
use common::ScriptedTransport;

#[allow(clippy::cast_possible_truncation)]
fn make_clip(dir: &tempfile::TempDir, payload_len: usize) -> FinalizedClip {
    let path = dir.path().join("clip.wav");
    let mut writer =
        ClipWriter::begin_capture(&path, payload_len, &AudioConfig::default()).unwrap();
    let payload: Vec<u8> = (0..payload_len).map(|i| (i % 251) as u8).collect();
    writer.append_block(&payload).unwrap();
    writer.finalize().unwrap()
}

fn test_config() -> UploadConfig {
    UploadConfig {
        api_key: Some("test-key".to_string()),
        connect_attempts: 3,
        connect_retry: Duration::from_millis(1),
        quiet_period: Duration::from_millis(50),
        ..UploadConfig::default()
    }
}

const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n\
    {\"results\":[{\"alternatives\":[{\"transcript\":\"hello world\"}]}]}";

#[test]
fn test_successful_upload() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(&dir, 32_000);

    let mut session = UploadSession::new(ScriptedTransport::responding(OK_RESPONSE), test_config());
    let outcome = session.upload(&clip).unwrap();

    assert_eq!(session.state(), ConnectionState::Complete);
    assert_eq!(outcome.status_line.as_deref(), Some("HTTP/1.1 200 OK"));
    assert_eq!(outcome.transcript.as_deref(), Some("hello world"));
}

#[test]
fn test_request_framing() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(&dir, 768);

    let mut session = UploadSession::new(ScriptedTransport::responding(OK_RESPONSE), test_config());
    session.upload(&clip).unwrap();

    let written = String::from_utf8(session.transport().written.clone()).unwrap();
    let mut lines = written.lines();

    assert_eq!(
        lines.next(),
        Some("POST /v1/speech:recognize?key=test-key HTTP/1.1")
    );
    assert_eq!(lines.next(), Some("Host: speech.googleapis.com"));
    assert_eq!(lines.next(), Some("Content-Type: application/json"));

    let body = std::str::from_utf8(session.transport().body()).unwrap();
    assert!(body.starts_with(
        "{\"config\":{\"encoding\":\"LINEAR16\",\"sampleRateHertz\":16000,\
         \"languageCode\":\"en-US\"},\"audio\":{\"content\":\""
    ));
    assert!(body.ends_with("\"}}"));
}

#[test]
fn test_content_length_is_exact() {
    // Zero payload, exactly one chunk, several chunks plus a partial one
    for payload_len in [0usize, 768, 32_000] {
        let dir = tempfile::tempdir().unwrap();
        let clip = make_clip(&dir, payload_len);

        let mut session =
            UploadSession::new(ScriptedTransport::responding(OK_RESPONSE), test_config());
        session.upload(&clip).unwrap();

        let transport = session.transport();
        assert_eq!(
            transport.body().len(),
            transport.declared_content_length(),
            "payload_len = {payload_len}"
        );
    }
}

#[test]
fn test_connect_bound_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(&dir, 768);

    let mut session = UploadSession::new(ScriptedTransport::refusing(), test_config());
    let err = session.upload(&clip).unwrap_err();

    assert!(matches!(err, Error::ConnectFailed { attempts: 3 }));
    assert_eq!(session.transport().connect_calls, 3);
    assert_eq!(session.state(), ConnectionState::Failed);
    // Nothing may be written without a connection
    assert!(session.transport().written.is_empty());
}

#[test]
fn test_quiet_period_timeout_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(&dir, 768);

    // Peer sends a few bytes then stays silent without closing
    let mut session = UploadSession::new(
        ScriptedTransport::stalling(b"HTTP/1.1 200 OK"),
        test_config(),
    );

    let started = Instant::now();
    let err = session.upload(&clip).unwrap_err();

    assert!(matches!(err, Error::ResponseTimeout(_)));
    assert_eq!(session.state(), ConnectionState::Failed);
    // Terminates within quiet period + scheduling slack, never hangs
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_transport_error_while_reading_ends_in_failed_state() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(&dir, 768);

    // Request goes out, then the first response poll errors
    let mut session = UploadSession::new(ScriptedTransport::failing_poll(), test_config());
    let err = session.upload(&clip).unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(session.state(), ConnectionState::Failed);
    assert!(!session.transport().written.is_empty());
}

#[test]
fn test_empty_response_is_distinct_failure() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(&dir, 768);

    let mut session = UploadSession::new(ScriptedTransport::responding(b""), test_config());
    let err = session.upload(&clip).unwrap_err();

    assert!(matches!(err, Error::EmptyResponse));
    assert_eq!(session.state(), ConnectionState::Failed);
}

#[test]
fn test_missing_api_key_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(&dir, 768);

    let config = UploadConfig {
        api_key: None,
        ..test_config()
    };
    let mut session = UploadSession::new(ScriptedTransport::responding(OK_RESPONSE), config);
    let err = session.upload(&clip).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(session.transport().connect_calls, 0);
}
