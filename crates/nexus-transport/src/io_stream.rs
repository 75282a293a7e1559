use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::TransportError;
use crate::Transport;

/// A [`Transport`] wrapping any `AsyncRead + AsyncWrite` stream — subprocess
/// stdio, a TCP socket, an SSH-tunneled child's pipes, whatever the caller
/// already connected. This crate never constructs the underlying stream
/// itself; that remains the job of whatever dials the peer.
///
/// Each half is held behind its own `Arc<Mutex<Option<_>>>` so `close_read`/
/// `close_write` — sync methods, called from `Drop`-adjacent and non-async
/// call sites — can hand the half off to a spawned task that actually shuts
/// it down (or, for the read half, just drops it) instead of only flipping a
/// flag. A flag alone never reaches the peer: the peer's `read_exact` only
/// observes EOF once the OS-level write half is actually shut down.
pub struct IoTransport<S> {
    reader: Arc<AsyncMutex<Option<ReadHalf<S>>>>,
    writer: Arc<AsyncMutex<Option<WriteHalf<S>>>>,
    read_closed: AtomicBool,
    write_closed: AtomicBool,
}

impl<S> IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Arc::new(AsyncMutex::new(Some(reader))),
            writer: Arc::new(AsyncMutex::new(Some(writer))),
            read_closed: AtomicBool::new(false),
            write_closed: AtomicBool::new(false),
        }
    }
}

impl<S> Transport for IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static,
{
    async fn read_exact(&self, n: usize) -> Result<Vec<u8>, TransportError> {
        if self.read_closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = vec![0u8; n];
        reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn write_all(&self, buf: &[u8]) -> Result<(), TransportError> {
        if self.write_closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(buf).await?;
        writer.flush().await?;
        Ok(())
    }

    fn close_read(&self) {
        if self.read_closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let reader = self.reader.clone();
        tokio::spawn(async move {
            reader.lock().await.take();
        });
    }

    fn close_write(&self) {
        if self.write_closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let writer = self.writer.clone();
        tokio::spawn(async move {
            if let Some(mut writer) = writer.lock().await.take() {
                let _ = writer.shutdown().await;
            }
        });
    }
}
