//! Canonical 44-byte PCM WAV header
//!
//! The payload size is fixed before capture starts, so the header is
//! computed once and written ahead of the data. `file_size` is always
//! `data_size + 36`; `byte_rate` and `block_align` are derived fields.

/// Size of the canonical PCM WAV header in bytes
pub const HEADER_BYTES: usize = 44;

/// RIFF chunk overhead included in the `file_size` field (header minus the
/// eight bytes of the RIFF tag and size field)
const RIFF_OVERHEAD: u32 = 36;

/// Build the header for a PCM payload of `data_size` bytes
#[must_use]
pub fn wav_header(
    data_size: u32,
    sample_rate: u32,
    bits_per_sample: u16,
    channels: u16,
) -> [u8; HEADER_BYTES] {
    let file_size = data_size + RIFF_OVERHEAD;
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bits_per_sample / 8);
    let block_align = channels * (bits_per_sample / 8);

    let mut header = [0u8; HEADER_BYTES];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&file_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}
