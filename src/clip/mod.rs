//! WAV clip storage: header layout, bounded writer, read-back token

mod header;
mod store;

pub use header::{HEADER_BYTES, wav_header};
pub use store::{ClipReader, ClipWriter, FinalizedClip};
