//! Configuration for the capture-upload pipeline
//!
//! Values come from an optional `pushtalk.toml` in the platform config
//! directory, overridden by `PUSHTALK_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Default speech recognition host
pub const DEFAULT_HOST: &str = "speech.googleapis.com";

/// Default recognition endpoint path
pub const DEFAULT_ENDPOINT: &str = "/v1/speech:recognize";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Audio capture parameters
    pub audio: AudioConfig,

    /// Path of the single clip file on local storage
    pub clip_path: PathBuf,

    /// Seconds to wait for a record trigger before giving up and sleeping
    pub idle_timeout_secs: u64,

    /// Upload session parameters
    pub upload: UploadConfig,
}

/// Audio capture parameters
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Stored PCM sample width in bits
    pub bits_per_sample: u16,

    /// Channel count (the microphone is mono)
    pub channels: u16,

    /// Fixed clip duration in seconds
    pub record_secs: u32,
}

impl AudioConfig {
    /// Total PCM payload size in bytes for one clip
    ///
    /// Known before capture starts, so the WAV header can be written first.
    #[must_use]
    pub const fn target_payload_bytes(&self) -> usize {
        self.channels as usize
            * self.sample_rate as usize
            * (self.bits_per_sample as usize / 8)
            * self.record_secs as usize
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            bits_per_sample: 16,
            channels: 1,
            record_secs: 1,
        }
    }
}

/// Upload session parameters
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Remote host name
    pub host: String,

    /// Remote TLS port
    pub port: u16,

    /// Recognition endpoint path (query string appended by the session)
    pub endpoint: String,

    /// API key appended as `?key=` (from `PUSHTALK_API_KEY`)
    pub api_key: Option<String>,

    /// BCP-47 language code sent in the request config
    pub language: String,

    /// Optional PEM file with the trusted root certificate
    pub root_cert_path: Option<PathBuf>,

    /// Maximum connection attempts before failing
    pub connect_attempts: u32,

    /// Delay between connection attempts
    pub connect_retry: Duration,

    /// Response quiet-period timeout (resets on every received byte)
    pub quiet_period: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 443,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            language: "en-US".to_string(),
            root_cert_path: None,
            connect_attempts: 5,
            connect_retry: Duration::from_secs(1),
            quiet_period: Duration::from_secs(10),
        }
    }
}

/// Optional on-disk configuration file shape
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    clip_path: Option<PathBuf>,
    idle_timeout_secs: Option<u64>,
    #[serde(default)]
    audio: FileAudio,
    #[serde(default)]
    upload: FileUpload,
}

#[derive(Debug, Default, Deserialize)]
struct FileAudio {
    sample_rate: Option<u32>,
    record_secs: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FileUpload {
    host: Option<String>,
    port: Option<u16>,
    endpoint: Option<String>,
    language: Option<String>,
    root_cert_path: Option<PathBuf>,
    connect_attempts: Option<u32>,
    connect_retry_secs: Option<u64>,
    quiet_period_secs: Option<u64>,
}

/// Return the data directory for clip storage, creating it if needed
#[must_use]
pub fn data_dir() -> PathBuf {
    let dir = directories::ProjectDirs::from("dev", "pushtalk", "pushtalk")
        .map_or_else(|| PathBuf::from(".pushtalk"), |d| d.data_dir().to_path_buf());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to create data directory");
    }

    dir
}

/// Return the path of the optional `pushtalk.toml` config file
fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "pushtalk", "pushtalk")
        .map(|d| d.config_dir().join("pushtalk.toml"))
}

impl Config {
    /// Load configuration from the config file (if present) and environment
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be parsed, or an
    /// environment override holds an unparseable value.
    pub fn load() -> Result<Self> {
        let mut config = Self {
            audio: AudioConfig::default(),
            clip_path: data_dir().join("recording.wav"),
            idle_timeout_secs: 10,
            upload: UploadConfig::default(),
        };

        if let Some(path) = config_file_path()
            && path.exists()
        {
            let text = std::fs::read_to_string(&path)?;
            config.apply_file(&text)?;
            tracing::debug!(path = %path.display(), "loaded config file");
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Apply a TOML config file over the current values
    fn apply_file(&mut self, text: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(text)?;

        if let Some(p) = file.clip_path {
            self.clip_path = p;
        }
        if let Some(secs) = file.idle_timeout_secs {
            self.idle_timeout_secs = secs;
        }
        if let Some(rate) = file.audio.sample_rate {
            self.audio.sample_rate = rate;
        }
        if let Some(secs) = file.audio.record_secs {
            self.audio.record_secs = secs;
        }
        if let Some(host) = file.upload.host {
            self.upload.host = host;
        }
        if let Some(port) = file.upload.port {
            self.upload.port = port;
        }
        if let Some(endpoint) = file.upload.endpoint {
            self.upload.endpoint = endpoint;
        }
        if let Some(lang) = file.upload.language {
            self.upload.language = lang;
        }
        if let Some(path) = file.upload.root_cert_path {
            self.upload.root_cert_path = Some(path);
        }
        if let Some(n) = file.upload.connect_attempts {
            self.upload.connect_attempts = n;
        }
        if let Some(secs) = file.upload.connect_retry_secs {
            self.upload.connect_retry = Duration::from_secs(secs);
        }
        if let Some(secs) = file.upload.quiet_period_secs {
            self.upload.quiet_period = Duration::from_secs(secs);
        }

        Ok(())
    }

    /// Apply `PUSHTALK_*` environment overrides
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("PUSHTALK_CLIP_PATH") {
            self.clip_path = PathBuf::from(path);
        }
        if let Ok(secs) = std::env::var("PUSHTALK_RECORD_SECS") {
            self.audio.record_secs = parse_env("PUSHTALK_RECORD_SECS", &secs)?;
        }
        if let Ok(host) = std::env::var("PUSHTALK_HOST") {
            self.upload.host = host;
        }
        if let Ok(endpoint) = std::env::var("PUSHTALK_ENDPOINT") {
            self.upload.endpoint = endpoint;
        }
        if let Ok(lang) = std::env::var("PUSHTALK_LANGUAGE") {
            self.upload.language = lang;
        }
        if let Ok(path) = std::env::var("PUSHTALK_ROOT_CERT") {
            self.upload.root_cert_path = Some(PathBuf::from(path));
        }
        if let Ok(secs) = std::env::var("PUSHTALK_QUIET_SECS") {
            self.upload.quiet_period =
                Duration::from_secs(parse_env("PUSHTALK_QUIET_SECS", &secs)?);
        }
        self.upload.api_key = std::env::var("PUSHTALK_API_KEY").ok();

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {name}: {value}")))
}
