//! pushtalk - push-to-record voice clip capture and upload
//!
//! Records a fixed-duration clip from the microphone on a trigger, persists
//! it as a WAV file, streams it base64-encoded inside a JSON recognition
//! request over TLS, and goes back to sleep.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ SampleSource │──▶│ FormatScaler │──▶│ ClipWriter (WAV) │
//! └──────────────┘   └──────────────┘   └────────┬─────────┘
//!                                                │ FinalizedClip
//!                    ┌───────────────────────────▼─────────┐
//!                    │ Transcoder: counting pass, then     │
//!                    │ emission pass (block-streamed b64)  │
//!                    └───────────────────────────┬─────────┘
//!                                                │
//!                    ┌───────────────────────────▼─────────┐
//!                    │ UploadSession over TLS Transport    │
//!                    └─────────────────────────────────────┘
//! ```
//!
//! The encoded body is never held in memory: the counting pass fixes the
//! Content-Length, the emission pass reproduces it chunk by chunk.

pub mod audio;
pub mod clip;
pub mod config;
pub mod cycle;
pub mod encode;
pub mod error;
pub mod upload;

pub use config::{AudioConfig, Config, UploadConfig};
pub use cycle::{CAPTURE_BLOCK_BYTES, DevicePanel, capture_clip, run_cycle};
pub use error::{Error, Result};
