//! Upload session over a TLS transport

mod session;
mod transport;

pub use session::{ConnectionState, UploadOutcome, UploadSession};
pub use transport::{TlsTransport, Transport};
