//! Native sample to PCM scaling
//!
//! The microphone delivers 16-bit little-endian frames whose low 12 bits
//! carry the ADC value. Storage wants 16-bit PCM. The rescale keeps the
//! original device arithmetic bit-for-bit: low output byte zero, high output
//! byte `(native * 256) / 2048` truncated to eight bits. It is lossy on
//! purpose; downstream consumers expect exactly this layout.

/// Bytes per native microphone sample
pub const NATIVE_SAMPLE_BYTES: usize = 2;

/// Scale a block of native samples into 16-bit little-endian PCM
///
/// `src` and `dst` must be the same length and a multiple of
/// [`NATIVE_SAMPLE_BYTES`]; each two-byte native frame produces two output
/// bytes, so the transform is length-preserving.
///
/// # Panics
///
/// Panics if `dst` is shorter than `src`.
pub fn scale_to_pcm(dst: &mut [u8], src: &[u8]) {
    assert!(dst.len() >= src.len(), "scale output buffer too short");

    for (out, frame) in dst
        .chunks_exact_mut(NATIVE_SAMPLE_BYTES)
        .zip(src.chunks_exact(NATIVE_SAMPLE_BYTES))
    {
        let native = (u32::from(frame[1] & 0x0f) << 8) | u32::from(frame[0]);
        out[0] = 0;
        #[allow(clippy::cast_possible_truncation)]
        {
            out[1] = (native * 256 / 2048) as u8;
        }
    }
}

/// Pack a 12-bit ADC value into the native little-endian frame layout
#[must_use]
pub const fn native_frame(value: u16) -> [u8; 2] {
    (value & 0x0fff).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled(frame: [u8; 2]) -> [u8; 2] {
        let mut out = [0xaa; 2];
        scale_to_pcm(&mut out, &frame);
        out
    }

    #[test]
    fn test_zero_sample() {
        assert_eq!(scaled(native_frame(0)), [0, 0]);
    }

    #[test]
    fn test_half_scale() {
        // 1024 * 256 / 2048 == 128
        assert_eq!(scaled(native_frame(1024)), [0, 128]);
    }

    #[test]
    fn test_top_of_low_half() {
        // 2047 * 256 / 2048 == 255
        assert_eq!(scaled(native_frame(2047)), [0, 255]);
    }

    #[test]
    fn test_wraps_like_device_arithmetic() {
        // 2048 * 256 / 2048 == 256, truncated to 0 as on the device
        assert_eq!(scaled(native_frame(2048)), [0, 0]);
        // 4095 -> 511 -> 255
        assert_eq!(scaled(native_frame(4095)), [0, 255]);
    }

    #[test]
    fn test_upper_nibble_ignored() {
        // Same 12-bit value, garbage in the top nibble
        let clean = scaled([0x34, 0x02]);
        let dirty = scaled([0x34, 0xf2]);
        assert_eq!(clean, dirty);
    }

    #[test]
    fn test_block_is_length_preserving() {
        let src: Vec<u8> = (0..64u16).flat_map(native_frame).collect();
        let mut dst = vec![0u8; src.len()];
        scale_to_pcm(&mut dst, &src);

        // Every even output byte is zero
        assert!(dst.iter().step_by(2).all(|&b| b == 0));
    }
}
