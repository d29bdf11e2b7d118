//! Audio sample sources
//!
//! [`SampleSource`] is the blocking microphone seam: fixed-size blocks of
//! native-format frames, no timeout. The production implementation adapts a
//! `cpal` input stream into the device's 12-bit frame layout so the rest of
//! the pipeline is identical for real and synthetic input.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::audio::scale::{NATIVE_SAMPLE_BYTES, native_frame};
use crate::{Error, Result};

/// Blocking source of native-format sample blocks
pub trait SampleSource {
    /// Fill `buf` with native sample bytes, blocking until data is available
    ///
    /// `buf.len()` must be a multiple of the native sample width. Returns
    /// the number of bytes read.
    ///
    /// # Errors
    ///
    /// Returns error on a malformed block length or device failure.
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Shared queue between the capture callback and the blocking reader
type FrameQueue = Arc<(Mutex<VecDeque<u8>>, Condvar)>;

/// Microphone-backed sample source
///
/// Captures mono f32 from the default input device and repacks each sample
/// into the native 12-bit little-endian frame layout.
pub struct MicSource {
    queue: FrameQueue,
    _stream: Stream,
}

impl MicSource {
    /// Open the default input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if no suitable input device or stream config exists.
    pub fn open(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "microphone source initialized"
        );

        let queue: FrameQueue = Arc::new((Mutex::new(VecDeque::new()), Condvar::new()));
        let producer = Arc::clone(&queue);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let (lock, cvar) = &*producer;
                    if let Ok(mut buf) = lock.lock() {
                        for &sample in data {
                            buf.extend(native_frame(sample_to_adc(sample)));
                        }
                        cvar.notify_one();
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            queue,
            _stream: stream,
        })
    }
}

impl SampleSource for MicSource {
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() % NATIVE_SAMPLE_BYTES != 0 {
            return Err(Error::Capture(format!(
                "block length {} is not a multiple of the sample width",
                buf.len()
            )));
        }

        let (lock, cvar) = &*self.queue;
        let mut queue = lock
            .lock()
            .map_err(|_| Error::Audio("capture queue poisoned".to_string()))?;

        // Blocking with no timeout: the caller accepts an unbounded wait
        while queue.len() < buf.len() {
            queue = cvar
                .wait(queue)
                .map_err(|_| Error::Audio("capture queue poisoned".to_string()))?;
        }

        let len = buf.len();
        for (slot, byte) in buf.iter_mut().zip(queue.drain(..len)) {
            *slot = byte;
        }

        Ok(len)
    }
}

/// Map an f32 sample in [-1.0, 1.0] to the unsigned 12-bit ADC range
fn sample_to_adc(sample: f32) -> u16 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = (sample.clamp(-1.0, 1.0).mul_add(2047.0, 2048.0)) as u16;
    value.min(4095)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_to_adc_range() {
        assert_eq!(sample_to_adc(-1.0), 1);
        assert_eq!(sample_to_adc(0.0), 2048);
        assert_eq!(sample_to_adc(1.0), 4095);

        // Out-of-range input is clamped, never wraps
        assert_eq!(sample_to_adc(4.0), 4095);
        assert_eq!(sample_to_adc(-4.0), 1);
    }
}
