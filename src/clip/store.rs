//! Clip storage on local flash
//!
//! One bounded WAV file per cycle. [`ClipWriter`] owns the file while the
//! payload fills; [`finalize`](ClipWriter::finalize) hands ownership to a
//! [`FinalizedClip`] token, the only way to read the clip back. The explicit
//! handoff replaces any shared global file handle: writer and reader can
//! never be live at the same time.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::clip::header::{HEADER_BYTES, wav_header};
use crate::config::AudioConfig;
use crate::{Error, Result};

/// Writes one clip: header up front, payload appended until full
pub struct ClipWriter {
    file: File,
    path: PathBuf,
    header: [u8; HEADER_BYTES],
    target_bytes: usize,
    written: usize,
}

impl ClipWriter {
    /// Create (or truncate) the clip file and write the final header
    ///
    /// `target_bytes` is fixed up front, so the header is complete from the
    /// start and is never rewritten; `audio` supplies the format fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the clip file cannot be created.
    pub fn begin_capture(path: &Path, target_bytes: usize, audio: &AudioConfig) -> Result<Self> {
        #[allow(clippy::cast_possible_truncation)]
        let header = wav_header(
            target_bytes as u32,
            audio.sample_rate,
            audio.bits_per_sample,
            audio.channels,
        );

        let mut file = File::create(path).map_err(|e| {
            Error::Storage(format!("cannot create clip file {}: {e}", path.display()))
        })?;
        file.write_all(&header)?;

        tracing::debug!(
            path = %path.display(),
            target_bytes,
            "capture started, header written"
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            header,
            target_bytes,
            written: 0,
        })
    }

    /// Append scaled PCM bytes, clamped to the remaining capacity
    ///
    /// Returns the number of bytes actually written; once the target size
    /// is reached further calls write nothing.
    ///
    /// # Errors
    ///
    /// Returns error if the storage write fails.
    pub fn append_block(&mut self, block: &[u8]) -> Result<usize> {
        let take = block.len().min(self.remaining());
        if take > 0 {
            self.file.write_all(&block[..take])?;
            self.written += take;
        }
        Ok(take)
    }

    /// Payload bytes still needed to reach the target size
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.target_bytes - self.written
    }

    /// Fixed payload target size in bytes
    #[must_use]
    pub const fn target_bytes(&self) -> usize {
        self.target_bytes
    }

    /// Whether the payload has reached its target size
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.written >= self.target_bytes
    }

    /// Close the file and hand the finished clip to the read side
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if the payload is not full, or an IO error
    /// if the final flush fails.
    pub fn finalize(mut self) -> Result<FinalizedClip> {
        if !self.is_full() {
            return Err(Error::Capture(format!(
                "clip finalized early: {} of {} payload bytes",
                self.written, self.target_bytes
            )));
        }
        self.file.flush()?;
        self.file.sync_all()?;

        tracing::debug!(
            path = %self.path.display(),
            payload_bytes = self.written,
            "clip finalized"
        );

        Ok(FinalizedClip {
            path: self.path,
            header: self.header,
            payload_bytes: self.written,
        })
    }
}

/// Ownership token for a complete, immutable clip
///
/// The clip must not change between the transcoder's counting and emission
/// passes; holding the token is what makes that contract checkable.
pub struct FinalizedClip {
    path: PathBuf,
    header: [u8; HEADER_BYTES],
    payload_bytes: usize,
}

impl FinalizedClip {
    /// Path of the underlying WAV file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The 44-byte header as written to storage
    #[must_use]
    pub const fn header(&self) -> &[u8; HEADER_BYTES] {
        &self.header
    }

    /// Payload size in bytes (excludes the header)
    #[must_use]
    pub const fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    /// Sample rate recorded in the header
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        u32::from_le_bytes([
            self.header[24],
            self.header[25],
            self.header[26],
            self.header[27],
        ])
    }

    /// Open a fresh reader over the payload region
    ///
    /// Each transcoding pass opens its own reader; the token stays borrowed
    /// so the clip cannot be deleted mid-pass.
    ///
    /// # Errors
    ///
    /// Returns error if the clip file cannot be opened.
    pub fn open_payload(&self) -> Result<ClipReader> {
        let mut file = File::open(&self.path).map_err(|e| {
            Error::Storage(format!("cannot open clip file {}: {e}", self.path.display()))
        })?;
        file.seek(SeekFrom::Start(HEADER_BYTES as u64))?;
        Ok(ClipReader { file })
    }

    /// Delete the clip file, consuming the token
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be removed.
    pub fn remove(self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        tracing::debug!(path = %self.path.display(), "clip removed");
        Ok(())
    }
}

/// Sequential reader over a finalized clip's payload
pub struct ClipReader {
    file: File,
}

impl ClipReader {
    /// Read up to `buf.len()` payload bytes, returning 0 at end of clip
    ///
    /// # Errors
    ///
    /// Returns error if the storage read fails; the caller must abort the
    /// current pass, not retry mid-transcode.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }
}
