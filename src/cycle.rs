//! One operating cycle: trigger, capture, upload, sleep
//!
//! Phases run strictly in order on one thread. Capture fully finalizes the
//! clip before any transcoding pass; the counting pass completes before the
//! emission pass; the session makes a single upload attempt. The button,
//! indicator LEDs, and low-power sleep live behind [`DevicePanel`]; the
//! cycle drives them but never implements hardware.

use std::path::Path;
use std::time::Duration;

use crate::audio::{SampleSource, scale_to_pcm};
use crate::clip::{ClipWriter, FinalizedClip};
use crate::config::{AudioConfig, Config};
use crate::upload::{Transport, UploadOutcome, UploadSession};
use crate::{Error, Result};

/// Native bytes pulled from the sample source per capture block
pub const CAPTURE_BLOCK_BYTES: usize = 16 * 1024;

/// Button, indicators, and sleep control (external collaborator)
pub trait DevicePanel {
    /// Whether a record trigger is currently asserted
    fn record_requested(&mut self) -> bool;

    /// Drive the recording indicator
    fn set_recording(&mut self, on: bool);

    /// Drive the network-link indicator
    fn set_link(&mut self, on: bool);

    /// Enter low-power sleep; the cycle is over when this is called
    fn enter_sleep(&mut self);
}

/// Acquire a bounded capture buffer, surfacing allocation failure
fn acquire_buffer(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| Error::Capture(format!("cannot acquire {len}-byte capture buffer: {e}")))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Record one clip: read, scale, append until the payload is full
///
/// # Errors
///
/// Returns error on buffer acquisition, storage, or sample source failure;
/// the capture is aborted, never silently retried.
pub fn capture_clip<S: SampleSource>(
    source: &mut S,
    path: &Path,
    audio: &AudioConfig,
    target_bytes: usize,
) -> Result<FinalizedClip> {
    let mut writer = ClipWriter::begin_capture(path, target_bytes, audio)?;
    let mut raw = acquire_buffer(CAPTURE_BLOCK_BYTES)?;
    let mut pcm = acquire_buffer(CAPTURE_BLOCK_BYTES)?;

    // The first block covers driver warm-up and is discarded
    source.read_block(&mut raw)?;

    tracing::info!(target_bytes = writer.target_bytes(), "recording started");
    while !writer.is_full() {
        let n = source.read_block(&mut raw)?;
        scale_to_pcm(&mut pcm[..n], &raw[..n]);
        writer.append_block(&pcm[..n])?;

        let target = writer.target_bytes();
        tracing::trace!(
            percent = (target - writer.remaining()) * 100 / target,
            "recording progress"
        );
    }

    writer.finalize()
}

/// Run one trigger-capture-upload cycle, ending in low-power sleep
///
/// Waits up to `idle_timeout_secs` for the record trigger, one check per
/// second. Without a trigger the cycle ends with no upload. After a
/// successful upload the clip is deleted; on failure it is left on storage.
///
/// # Errors
///
/// Returns the capture or upload error after directing the panel to sleep;
/// nothing is retried beyond the session's bounded connect attempts.
pub fn run_cycle<S, T, P>(
    config: &Config,
    source: &mut S,
    transport: T,
    panel: &mut P,
) -> Result<Option<UploadOutcome>>
where
    S: SampleSource,
    T: Transport,
    P: DevicePanel,
{
    let mut clip = None;

    for seconds_left in (1..=config.idle_timeout_secs).rev() {
        if panel.record_requested() {
            tracing::info!("record trigger asserted");
            panel.set_recording(true);
            let result = capture_clip(
                source,
                &config.clip_path,
                &config.audio,
                config.audio.target_payload_bytes(),
            );
            panel.set_recording(false);

            match result {
                Ok(c) => clip = Some(c),
                Err(e) => {
                    tracing::error!(error = %e, "capture aborted");
                    panel.enter_sleep();
                    return Err(e);
                }
            }
            break;
        }

        tracing::info!(seconds_left, "waiting for record trigger");
        std::thread::sleep(Duration::from_secs(1));
    }

    let Some(clip) = clip else {
        tracing::info!("no recording this cycle");
        panel.enter_sleep();
        return Ok(None);
    };

    let mut session = UploadSession::new(transport, config.upload.clone());
    match session.upload(&clip) {
        Ok(outcome) => {
            panel.set_link(true);
            if let Err(e) = clip.remove() {
                tracing::warn!(error = %e, "uploaded clip could not be removed");
            }
            panel.enter_sleep();
            Ok(Some(outcome))
        }
        Err(e) => {
            tracing::error!(error = %e, "upload failed, clip retained");
            panel.set_link(false);
            panel.enter_sleep();
            Err(e)
        }
    }
}
