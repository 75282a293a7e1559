use crate::io_stream::IoTransport;
use tokio::io::DuplexStream;

/// An in-process transport pair, backed by `tokio::io::duplex`. Used by
/// tests and by same-process peers (e.g. a peer spawned as a Tokio task
/// rather than a subprocess).
pub type MemTransport = IoTransport<DuplexStream>;

impl MemTransport {
    /// Create a connected pair of in-process transports.
    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (IoTransport::new(a), IoTransport::new(b))
    }
}
