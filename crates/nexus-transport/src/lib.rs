//! The `Transport` trait consumed by the core, plus the two backends this
//! workspace is allowed to own outright: an in-process duplex pair and a
//! generic adapter over any `AsyncRead + AsyncWrite` stream.
//!
//! Concrete transports that actually dial somewhere (subprocess spawning,
//! TCP connect, SSH invocation) are the embedding application's job — this
//! crate only needs to be handed an already-connected stream.

mod error;
mod io_stream;
mod mem;

pub use error::TransportError;
pub use io_stream::IoTransport;
pub use mem::MemTransport;

use std::future::Future;

/// A full-duplex byte stream.
///
/// `read_exact`/`write_all` operate on whole buffers: a short read always
/// means end-of-stream (surfaced as [`TransportError::Eof`]), and a write
/// either succeeds in full or fails — there is no partial-write case visible
/// to callers. `close_read`/`close_write` are independent half-closes and
/// idempotent.
pub trait Transport: Send + Sync + 'static {
    /// Read exactly `n` bytes, or fail with [`TransportError::Eof`].
    fn read_exact(&self, n: usize) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Write the entire buffer. Implementations must not interleave partial
    /// writes from concurrent callers — callers that cannot guarantee this
    /// on their own (e.g. two channels on the same gateway sending
    /// concurrently) rely on the gateway's own write serialization instead.
    fn write_all(&self, buf: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Half-close the read side. Idempotent.
    fn close_read(&self);

    /// Half-close the write side. Idempotent.
    fn close_write(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mem_transport_round_trips() {
        let (a, b) = MemTransport::pair();
        a.write_all(b"hello").await.unwrap();
        let got = b.read_exact(5).await.unwrap();
        assert_eq!(&got, b"hello");
    }

    #[tokio::test]
    async fn mem_transport_eof_after_close() {
        let (a, b) = MemTransport::pair();
        a.close_write();
        let err = b.read_exact(1).await.unwrap_err();
        assert!(matches!(err, TransportError::Eof));
    }

    #[tokio::test]
    async fn close_write_is_idempotent() {
        let (a, b) = MemTransport::pair();
        a.close_write();
        a.close_write();
        let err = b.read_exact(1).await.unwrap_err();
        assert!(matches!(err, TransportError::Eof));
        let err = a.write_all(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
