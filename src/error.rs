//! Error types for the pushtalk pipeline

use std::time::Duration;

use thiserror::Error;

/// Result type alias for pushtalk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the capture-upload pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Capture buffer acquisition or block sizing error
    #[error("capture error: {0}")]
    Capture(String),

    /// Clip storage could not be initialized
    #[error("storage error: {0}")]
    Storage(String),

    /// Connection attempts exhausted without reaching the endpoint
    #[error("connection failed after {attempts} attempts")]
    ConnectFailed {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Transport-level failure (DNS, socket, TLS handshake)
    #[error("transport error: {0}")]
    Transport(String),

    /// No new response bytes arrived within the quiet period
    #[error("response timed out after {0:?} of silence")]
    ResponseTimeout(Duration),

    /// Peer closed the connection without sending any response bytes
    #[error("empty response from peer")]
    EmptyResponse,

    /// IO error (clip storage reads/writes)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS connector error
    #[error("tls error: {0}")]
    Tls(#[from] native_tls::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
