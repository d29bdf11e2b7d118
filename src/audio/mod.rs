//! Audio acquisition and sample format handling

mod scale;
mod source;

pub use scale::{NATIVE_SAMPLE_BYTES, native_frame, scale_to_pcm};
pub use source::{MicSource, SampleSource};
