//! Shared test doubles for the capture-upload pipeline
#![allow(dead_code)] // each test binary uses a subset of the doubles

use std::collections::VecDeque;

use pushtalk::audio::{SampleSource, native_frame};
use pushtalk::upload::Transport;
use pushtalk::{Error, Result};

/// Deterministic sample source: an endless ramp over the 12-bit range
#[derive(Default)]
pub struct RampSource {
    next_frame: u64,
}

impl RampSource {
    /// Native bytes for frames `[start, start + count)` of the ramp
    #[allow(clippy::cast_possible_truncation)]
    pub fn pattern(start: u64, count: usize) -> Vec<u8> {
        (start..)
            .take(count)
            .flat_map(|i| native_frame((i % 4096) as u16))
            .collect()
    }
}

impl SampleSource for RampSource {
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize> {
        assert_eq!(buf.len() % 2, 0, "block length must be frame-aligned");
        let frames = buf.len() / 2;
        buf.copy_from_slice(&Self::pattern(self.next_frame, frames));
        self.next_frame += frames as u64;
        Ok(buf.len())
    }
}

/// Scripted peer for the upload session
///
/// Records everything written, serves a canned response byte stream, and
/// models the peer either closing after the response or stalling forever.
pub struct ScriptedTransport {
    /// Every byte the session wrote, request head included
    pub written: Vec<u8>,
    /// How many times `connect` was called
    pub connect_calls: u32,
    connect_ok: bool,
    response: VecDeque<u8>,
    close_when_drained: bool,
    poll_fails: bool,
    connected: bool,
}

impl ScriptedTransport {
    /// Peer that accepts the connection and closes after `response`
    pub fn responding(response: &[u8]) -> Self {
        Self {
            written: Vec::new(),
            connect_calls: 0,
            connect_ok: true,
            response: response.iter().copied().collect(),
            close_when_drained: true,
            poll_fails: false,
            connected: false,
        }
    }

    /// Peer that sends `response` then stays connected, silent, forever
    pub fn stalling(response: &[u8]) -> Self {
        Self {
            close_when_drained: false,
            ..Self::responding(response)
        }
    }

    /// Peer that refuses every connection attempt
    pub fn refusing() -> Self {
        Self {
            connect_ok: false,
            ..Self::responding(b"")
        }
    }

    /// Peer that accepts the connection, then fails every response poll
    pub fn failing_poll() -> Self {
        Self {
            poll_fails: true,
            ..Self::stalling(b"")
        }
    }

    /// The request bytes written after the HTTP header block
    pub fn body(&self) -> &[u8] {
        let text = std::str::from_utf8(&self.written).expect("request is not utf-8");
        let split = text.find("\r\n\r\n").expect("request has no header terminator");
        &self.written[split + 4..]
    }

    /// The declared Content-Length header value
    pub fn declared_content_length(&self) -> usize {
        let text = std::str::from_utf8(&self.written).expect("request is not utf-8");
        text.lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .expect("request has no Content-Length")
            .trim()
            .parse()
            .expect("Content-Length is not a number")
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, _host: &str, _port: u16) -> Result<bool> {
        self.connect_calls += 1;
        if self.connect_ok {
            self.connected = true;
        }
        Ok(self.connect_ok)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn available(&mut self) -> Result<bool> {
        if self.poll_fails {
            return Err(Error::Transport("poll failed".to_string()));
        }
        Ok(!self.response.is_empty())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.response.pop_front())
    }

    fn connected(&self) -> bool {
        if self.close_when_drained && self.response.is_empty() {
            return false;
        }
        self.connected
    }

    fn stop(&mut self) {
        self.connected = false;
    }
}
