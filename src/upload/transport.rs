//! Network transport seam for the upload session
//!
//! [`Transport`] mirrors the byte-level client the device firmware talks
//! to: connect, write, poll for available bytes, read one byte, observe
//! peer close, stop. The production implementation is TLS over TCP via
//! `native-tls`; tests drive the session with scripted implementations.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use native_tls::{Certificate, TlsConnector, TlsStream};

use crate::{Error, Result};

/// How long one read poll may block on the socket
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Byte-level client connection
pub trait Transport {
    /// Attempt to open a connection; `false` means this attempt failed
    ///
    /// # Errors
    ///
    /// Returns error only for failures that retrying cannot help.
    fn connect(&mut self, host: &str, port: u16) -> Result<bool>;

    /// Write all bytes to the peer
    ///
    /// # Errors
    ///
    /// Returns error if the connection is gone or the write fails.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Whether at least one response byte can be read right now
    ///
    /// # Errors
    ///
    /// Returns error if polling the connection fails.
    fn available(&mut self) -> Result<bool>;

    /// Read one byte; `None` if nothing is available yet
    ///
    /// # Errors
    ///
    /// Returns error if the read fails for a reason other than no-data.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Whether the peer has not yet closed the connection
    fn connected(&self) -> bool;

    /// Close the connection
    fn stop(&mut self);
}

/// TLS transport over a TCP stream
pub struct TlsTransport {
    connector: TlsConnector,
    stream: Option<TlsStream<TcpStream>>,
    peeked: Option<u8>,
    open: bool,
}

impl TlsTransport {
    /// Build the transport, optionally pinning a trusted root certificate
    ///
    /// # Errors
    ///
    /// Returns error if the certificate cannot be parsed or the TLS
    /// connector cannot be built.
    pub fn new(root_cert_pem: Option<&[u8]>) -> Result<Self> {
        let mut builder = TlsConnector::builder();
        if let Some(pem) = root_cert_pem {
            builder.add_root_certificate(Certificate::from_pem(pem)?);
        }

        Ok(Self {
            connector: builder.build()?,
            stream: None,
            peeked: None,
            open: false,
        })
    }

    /// Pull one byte off the stream, tracking peer close and poll timeouts
    fn pull_byte(&mut self) -> Result<Option<u8>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let mut byte = [0u8; 1];
        match stream.read(&mut byte) {
            Ok(0) => {
                self.open = false;
                Ok(None)
            }
            Ok(_) => Ok(Some(byte[0])),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(e) => {
                self.open = false;
                Err(Error::Transport(format!("read failed: {e}")))
            }
        }
    }
}

impl Transport for TlsTransport {
    fn connect(&mut self, host: &str, port: u16) -> Result<bool> {
        let tcp = match TcpStream::connect((host, port)) {
            Ok(tcp) => tcp,
            Err(e) => {
                tracing::warn!(host, port, error = %e, "tcp connect failed");
                return Ok(false);
            }
        };
        tcp.set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|e| Error::Transport(format!("cannot set read timeout: {e}")))?;

        match self.connector.connect(host, tcp) {
            Ok(stream) => {
                tracing::debug!(host, port, "tls connection established");
                self.stream = Some(stream);
                self.peeked = None;
                self.open = true;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(host, port, error = %e, "tls handshake failed");
                Ok(false)
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Transport("write on closed connection".to_string()))?;
        stream
            .write_all(data)
            .map_err(|e| Error::Transport(format!("write failed: {e}")))
    }

    fn available(&mut self) -> Result<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        self.peeked = self.pull_byte()?;
        Ok(self.peeked.is_some())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if let Some(byte) = self.peeked.take() {
            return Ok(Some(byte));
        }
        self.pull_byte()
    }

    fn connected(&self) -> bool {
        self.open && self.stream.is_some()
    }

    fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown();
            tracing::debug!("connection closed");
        }
        self.open = false;
        self.peeked = None;
    }
}
