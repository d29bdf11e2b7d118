//! Streaming base64 transcoding of a finalized clip
//!
//! The encoded body of a clip is far larger than the memory available for
//! it, so the transcoder never materializes it. One traversal algorithm
//! reads the clip in fixed-size blocks, encodes each block independently,
//! and pushes the sanitized text at a [`ChunkSink`]. Counting the request
//! body length and emitting it to the network are the same pass with
//! different sinks, which is what guarantees the declared Content-Length is
//! reproduced exactly.
//!
//! Traversal order is fixed: the 44-byte header zero-padded into a 48-byte
//! buffer and encoded as one block, then the payload in
//! [`ENCODE_CHUNK_BYTES`] blocks. Both block sizes are multiples of 3, so
//! independently encoded blocks concatenate into one valid base64 stream
//! with padding only at the very end.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::clip::{FinalizedClip, HEADER_BYTES};
use crate::Result;

/// Header bytes are encoded from a zero-padded buffer of this size
pub const PADDED_HEADER_BYTES: usize = HEADER_BYTES + 4;

/// Payload bytes consumed per encoded chunk
pub const ENCODE_CHUNK_BYTES: usize = 768;

/// Replacement for any character outside the base64 alphabet
pub const PLACEHOLDER: char = 'A';

/// Produces base64 text for one block of clip bytes
///
/// Injectable so the sanitization pass can be exercised against an encoder
/// that misbehaves.
pub trait ChunkEncoder {
    /// Encode one block of bytes as base64 text
    fn encode_chunk(&self, data: &[u8]) -> String;
}

/// Production encoder backed by the standard base64 alphabet
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardEncoder;

impl ChunkEncoder for StandardEncoder {
    fn encode_chunk(&self, data: &[u8]) -> String {
        STANDARD.encode(data)
    }
}

/// Receives sanitized chunks from a transcoding pass
pub trait ChunkSink {
    /// Accept one sanitized chunk of base64 text
    ///
    /// # Errors
    ///
    /// Returns error if the sink cannot take the chunk; the pass aborts.
    fn accept(&mut self, chunk: &str) -> Result<()>;
}

/// Counting sink: accumulates total encoded length, transmits nothing
#[derive(Debug, Default)]
pub struct LengthCounter {
    total: usize,
}

impl LengthCounter {
    /// Total encoded characters seen so far
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }
}

impl ChunkSink for LengthCounter {
    fn accept(&mut self, chunk: &str) -> Result<()> {
        self.total += chunk.len();
        Ok(())
    }
}

/// Block-streaming base64 transcoder over a finalized clip
#[derive(Debug, Default)]
pub struct Transcoder<E = StandardEncoder> {
    encoder: E,
}

impl Transcoder<StandardEncoder> {
    /// Transcoder with the production encoder
    #[must_use]
    pub const fn new() -> Self {
        Self {
            encoder: StandardEncoder,
        }
    }
}

impl<E: ChunkEncoder> Transcoder<E> {
    /// Transcoder with an injected encoder
    #[must_use]
    pub const fn with_encoder(encoder: E) -> Self {
        Self { encoder }
    }

    /// Size-counting pass: total encoded length of header + payload
    ///
    /// Opens its own reader over the clip; the clip must not change before
    /// the emission pass runs.
    ///
    /// # Errors
    ///
    /// Returns error if a storage read fails.
    pub fn encoded_len(&self, clip: &FinalizedClip) -> Result<usize> {
        let mut counter = LengthCounter::default();
        self.run(clip, &mut counter)?;
        Ok(counter.total())
    }

    /// Emission pass: stream every sanitized chunk into `sink`
    ///
    /// Identical traversal to [`encoded_len`](Self::encoded_len); chunks are
    /// forwarded and dropped, never accumulated.
    ///
    /// # Errors
    ///
    /// Returns error if a storage read or the sink fails; the caller must
    /// treat this as upload failure, not retry mid-transcode.
    pub fn emit<S: ChunkSink>(&self, clip: &FinalizedClip, sink: &mut S) -> Result<()> {
        self.run(clip, sink)
    }

    /// The shared traversal: padded header block, then payload blocks
    fn run<S: ChunkSink>(&self, clip: &FinalizedClip, sink: &mut S) -> Result<()> {
        let mut padded = [0u8; PADDED_HEADER_BYTES];
        padded[..HEADER_BYTES].copy_from_slice(clip.header());
        sink.accept(&sanitize(&self.encoder.encode_chunk(&padded)))?;

        let mut reader = clip.open_payload()?;
        let mut block = [0u8; ENCODE_CHUNK_BYTES];
        loop {
            let n = reader.read_block(&mut block)?;
            if n == 0 {
                break;
            }
            sink.accept(&sanitize(&self.encoder.encode_chunk(&block[..n])))?;
        }

        Ok(())
    }
}

/// Strip newlines, then replace anything outside `[A-Za-z0-9+/=]`
///
/// A correct encoder never produces such characters; the pass is a safety
/// net that keeps a corrupted chunk from breaking the JSON string literal
/// it is spliced into.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|&c| c != '\n' && c != '\r')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=' {
                c
            } else {
                PLACEHOLDER
            }
        })
        .collect()
}
