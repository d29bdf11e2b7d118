//! Upload session: HTTP framing over a [`Transport`]
//!
//! One attempt per capture cycle. The request body is
//! `prefix + base64(header + payload) + suffix`; its length is computed by
//! the transcoder's counting pass before a single body byte is written, and
//! the emission pass reproduces it chunk for chunk. The response is read
//! byte-wise under a quiet-period timeout that resets whenever data arrives.

use std::time::{Duration, Instant};

use crate::clip::FinalizedClip;
use crate::config::UploadConfig;
use crate::encode::{ChunkSink, Transcoder};
use crate::upload::transport::Transport;
use crate::{Error, Result};

/// Pause between idle polls of the response stream
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Connection lifecycle of one upload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection yet
    Disconnected,
    /// Attempting to reach the endpoint
    Connecting,
    /// Connected, request not yet fully sent
    Connected,
    /// Request sent, reading the response
    AwaitingResponse,
    /// Peer closed after a non-empty response
    Complete,
    /// Attempt failed (connect bound, timeout, empty response, IO)
    Failed,
}

/// Result of a completed upload
#[derive(Debug)]
pub struct UploadOutcome {
    /// HTTP status line, if the response contained one
    pub status_line: Option<String>,
    /// Raw response body (after the header block)
    pub body: String,
    /// Recognized transcript, if the body parsed as a recognition result
    pub transcript: Option<String>,
}

/// Shape of the recognition response body
#[derive(serde::Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[derive(serde::Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternatives: Vec<RecognizeAlternative>,
}

#[derive(serde::Deserialize)]
struct RecognizeAlternative {
    #[serde(default)]
    transcript: String,
}

/// Emission-mode sink: forwards each sanitized chunk straight to the peer
struct TransportSink<'a, T: Transport> {
    transport: &'a mut T,
    written: usize,
}

impl<T: Transport> ChunkSink for TransportSink<'_, T> {
    fn accept(&mut self, chunk: &str) -> Result<()> {
        self.transport.write_all(chunk.as_bytes())?;
        self.written += chunk.len();
        Ok(())
    }
}

/// One-shot upload of a finalized clip
pub struct UploadSession<T: Transport> {
    transport: T,
    config: UploadConfig,
    state: ConnectionState,
}

impl<T: Transport> UploadSession<T> {
    /// Create a session over a transport
    #[must_use]
    pub const fn new(transport: T, config: UploadConfig) -> Self {
        Self {
            transport,
            config,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current connection state
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Borrow the underlying transport
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Send the clip and read the response
    ///
    /// Every failure stops the transport and leaves the session in
    /// [`ConnectionState::Failed`]; success ends in
    /// [`ConnectionState::Complete`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectFailed`] when the attempt bound is
    /// exhausted, [`Error::ResponseTimeout`] when the quiet period elapses,
    /// [`Error::EmptyResponse`] when the peer closes without sending
    /// anything, or the underlying storage/transport error.
    pub fn upload(&mut self, clip: &FinalizedClip) -> Result<UploadOutcome> {
        match self.try_upload(clip) {
            Ok(outcome) => {
                self.set_state(ConnectionState::Complete);
                Ok(outcome)
            }
            Err(e) => {
                self.transport.stop();
                self.set_state(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    /// The fallible body of [`upload`](Self::upload); any `Err` leaving
    /// here is turned into the terminal `Failed` state by the caller
    fn try_upload(&mut self, clip: &FinalizedClip) -> Result<UploadOutcome> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("PUSHTALK_API_KEY is not set".to_string()))?;

        self.connect()?;
        self.send_request(clip, &api_key)?;
        let response = self.read_response()?;
        Ok(parse_response(&response))
    }

    /// Bounded connection loop with a fixed inter-attempt delay
    fn connect(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);

        for attempt in 1..=self.config.connect_attempts {
            if self
                .transport
                .connect(&self.config.host, self.config.port)?
            {
                tracing::info!(
                    host = %self.config.host,
                    port = self.config.port,
                    attempt,
                    "connected to recognition endpoint"
                );
                self.set_state(ConnectionState::Connected);
                return Ok(());
            }

            tracing::warn!(attempt, max = self.config.connect_attempts, "connect attempt failed");
            if attempt < self.config.connect_attempts {
                std::thread::sleep(self.config.connect_retry);
            }
        }

        Err(Error::ConnectFailed {
            attempts: self.config.connect_attempts,
        })
    }

    /// Frame and send the request: head, JSON prefix, body stream, suffix
    fn send_request(&mut self, clip: &FinalizedClip, api_key: &str) -> Result<()> {
        let prefix = format!(
            "{{\"config\":{{\"encoding\":\"LINEAR16\",\"sampleRateHertz\":{},\
             \"languageCode\":\"{}\"}},\"audio\":{{\"content\":\"",
            clip.sample_rate(),
            self.config.language
        );
        let suffix = "\"}}";

        let transcoder = Transcoder::new();
        let encoded_len = transcoder.encoded_len(clip)?;
        let content_length = prefix.len() + encoded_len + suffix.len();

        let head = format!(
            "POST {}?key={api_key} HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {content_length}\r\n\
             Connection: close\r\n\r\n",
            self.config.endpoint, self.config.host
        );

        tracing::debug!(encoded_len, content_length, "sending recognition request");

        self.transport.write_all(head.as_bytes())?;
        self.transport.write_all(prefix.as_bytes())?;

        let mut sink = TransportSink {
            transport: &mut self.transport,
            written: 0,
        };
        transcoder.emit(clip, &mut sink)?;
        let emitted = sink.written;

        self.transport.write_all(suffix.as_bytes())?;
        self.set_state(ConnectionState::AwaitingResponse);

        debug_assert_eq!(emitted, encoded_len);
        tracing::debug!(emitted, "request body sent");
        Ok(())
    }

    /// Read until peer close or a quiet period with no new bytes
    fn read_response(&mut self) -> Result<Vec<u8>> {
        let quiet = self.config.quiet_period;
        let mut response = Vec::new();
        let mut last_byte = Instant::now();

        while self.transport.connected() {
            if self.transport.available()?
                && let Some(byte) = self.transport.read_byte()?
            {
                response.push(byte);
                last_byte = Instant::now();
                continue;
            }

            if last_byte.elapsed() >= quiet {
                tracing::warn!(received = response.len(), "response quiet period elapsed");
                return Err(Error::ResponseTimeout(quiet));
            }

            std::thread::sleep(IDLE_POLL);
        }

        self.transport.stop();

        if response.is_empty() {
            return Err(Error::EmptyResponse);
        }

        tracing::info!(bytes = response.len(), "response received");
        Ok(response)
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "upload session state");
            self.state = state;
        }
    }
}

/// Split the raw response and pull a transcript out of the JSON body
fn parse_response(raw: &[u8]) -> UploadOutcome {
    let text = String::from_utf8_lossy(raw);

    let (head, body) = text
        .split_once("\r\n\r\n")
        .map_or((text.as_ref(), ""), |(h, b)| (h, b));
    let status_line = head.lines().next().map(ToString::to_string);

    let transcript = serde_json::from_str::<RecognizeResponse>(body)
        .ok()
        .and_then(|r| {
            r.results
                .first()
                .and_then(|res| res.alternatives.first())
                .map(|alt| alt.transcript.clone())
        });

    if let Some(t) = &transcript {
        tracing::info!(transcript = %t, "recognition complete");
    } else {
        tracing::debug!(body_len = body.len(), "response body had no transcript");
    }

    UploadOutcome {
        status_line,
        body: body.to_string(),
        transcript,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_with_transcript() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n\
            {\"results\":[{\"alternatives\":[{\"transcript\":\"hello world\"}]}]}";
        let outcome = parse_response(raw);

        assert_eq!(outcome.status_line.as_deref(), Some("HTTP/1.1 200 OK"));
        assert_eq!(outcome.transcript.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_parse_response_without_body() {
        let outcome = parse_response(b"HTTP/1.1 400 Bad Request\r\n\r\n");
        assert_eq!(
            outcome.status_line.as_deref(),
            Some("HTTP/1.1 400 Bad Request")
        );
        assert!(outcome.transcript.is_none());
        assert!(outcome.body.is_empty());
    }

    #[test]
    fn test_parse_response_tolerates_non_json_body() {
        let outcome = parse_response(b"HTTP/1.1 200 OK\r\n\r\nnot json");
        assert!(outcome.transcript.is_none());
        assert_eq!(outcome.body, "not json");
    }
}
