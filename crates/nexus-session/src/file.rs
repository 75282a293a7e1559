use std::collections::VecDeque;

use nexus_wire::Value;
use parking_lot::Mutex;

use crate::channel::{Channel, ChannelItem};
use crate::error::ChannelError;

/// Which direction a [`ChannelFile`] moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

/// A byte-stream view of a [`Channel`], for code that wants to treat it
/// like stdout/stdin rather than a typed message queue — redirecting a
/// remote process's standard streams, for instance.
///
/// In [`FileMode::Write`], each `write` sends one item. In
/// [`FileMode::Read`], `read(n)` accumulates items (which must decode to
/// byte or text values) into an internal buffer until `n` bytes are
/// available, returning fewer only once the channel reaches end-of-stream.
pub struct ChannelFile {
    channel: Channel,
    mode: FileMode,
    buffer: Mutex<VecDeque<u8>>,
    eof: std::sync::atomic::AtomicBool,
}

impl ChannelFile {
    pub fn new(channel: Channel, mode: FileMode) -> Self {
        ChannelFile {
            channel,
            mode,
            buffer: Mutex::new(VecDeque::new()),
            eof: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Send `data` as one chunk. Only meaningful in [`FileMode::Write`].
    pub async fn write(&self, data: &[u8]) -> Result<(), ChannelError> {
        self.channel.send(Value::Bytes(data.to_vec())).await
    }

    /// Receive the next chunk as raw bytes, with no buffering. Only
    /// meaningful in [`FileMode::Read`]; a `Text` item is encoded as UTF-8,
    /// anything else is a remote error.
    pub async fn read_chunk(&self) -> Result<Vec<u8>, ChannelError> {
        match self.channel.receive().await? {
            ChannelItem::Value(Value::Bytes(b)) => Ok(b),
            ChannelItem::Value(Value::Text(s)) => Ok(s.into_bytes()),
            ChannelItem::Value(other) => Err(ChannelError::Remote(crate::error::RemoteError::new(
                format!("channel file received a non-byte value: {other:?}"),
            ))),
            ChannelItem::Channel(_) => Err(ChannelError::Remote(crate::error::RemoteError::new(
                "channel file received a channel reference instead of data",
            ))),
        }
    }

    /// Read exactly `n` bytes, pulling more chunks off the channel as
    /// needed. Returns fewer than `n` bytes only once the channel has
    /// reached end-of-stream; returns an empty vec if it was already at
    /// end-of-stream with nothing buffered.
    pub async fn read(&self, n: usize) -> Result<Vec<u8>, ChannelError> {
        self.fill_to(n).await?;
        let mut buffer = self.buffer.lock();
        let take = n.min(buffer.len());
        Ok(buffer.drain(..take).collect())
    }

    /// Read up to and including the next `\n`. Returns whatever remains
    /// (possibly empty, possibly without a trailing `\n`) once the channel
    /// reaches end-of-stream before a newline arrives.
    pub async fn readline(&self) -> Result<Vec<u8>, ChannelError> {
        loop {
            {
                let mut buffer = self.buffer.lock();
                if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    return Ok(buffer.drain(..=pos).collect());
                }
                if self.eof.load(std::sync::atomic::Ordering::Acquire) {
                    return Ok(buffer.drain(..).collect());
                }
            }
            self.pull_one_chunk().await?;
        }
    }

    async fn fill_to(&self, n: usize) -> Result<(), ChannelError> {
        loop {
            if self.buffer.lock().len() >= n || self.eof.load(std::sync::atomic::Ordering::Acquire) {
                return Ok(());
            }
            self.pull_one_chunk().await?;
        }
    }

    async fn pull_one_chunk(&self) -> Result<(), ChannelError> {
        match self.read_chunk().await {
            Ok(bytes) => {
                self.buffer.lock().extend(bytes);
                Ok(())
            }
            Err(ChannelError::EndOfStream) => {
                self.eof.store(true, std::sync::atomic::Ordering::Release);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn close(&self) -> Result<(), ChannelError> {
        self.channel.close(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Gateway;
    use nexus_transport::MemTransport;
    use nexus_wire::DialectOptions;

    #[tokio::test]
    async fn read_accumulates_across_chunks_to_exact_size() {
        let (local_io, peer_io) = MemTransport::pair();
        let local = Gateway::connect(local_io, DialectOptions::default());
        let channel = local.new_channel().unwrap();
        let file = ChannelFile::new(channel.clone(), FileMode::Read);

        nexus_wire::write_message(
            &peer_io,
            nexus_wire::Message::channel_data(channel.id(), Value::Bytes(vec![1, 2])),
        )
        .await
        .unwrap();
        nexus_wire::write_message(
            &peer_io,
            nexus_wire::Message::channel_data(channel.id(), Value::Bytes(vec![3, 4, 5])),
        )
        .await
        .unwrap();

        let got = file.read(4).await.unwrap();
        assert_eq!(got, vec![1, 2, 3, 4]);
        let rest = file.read(1).await.unwrap();
        assert_eq!(rest, vec![5]);
    }

    #[tokio::test]
    async fn read_returns_short_at_end_of_stream() {
        let (local_io, peer_io) = MemTransport::pair();
        let local = Gateway::connect(local_io, DialectOptions::default());
        let channel = local.new_channel().unwrap();
        let file = ChannelFile::new(channel.clone(), FileMode::Read);

        nexus_wire::write_message(
            &peer_io,
            nexus_wire::Message::channel_data(channel.id(), Value::Bytes(vec![9])),
        )
        .await
        .unwrap();
        nexus_wire::write_message(&peer_io, nexus_wire::Message::channel_close(channel.id()))
            .await
            .unwrap();

        let got = file.read(10).await.unwrap();
        assert_eq!(got, vec![9]);
    }

    #[tokio::test]
    async fn readline_splits_on_newline() {
        let (local_io, peer_io) = MemTransport::pair();
        let local = Gateway::connect(local_io, DialectOptions::default());
        let channel = local.new_channel().unwrap();
        let file = ChannelFile::new(channel.clone(), FileMode::Read);

        nexus_wire::write_message(
            &peer_io,
            nexus_wire::Message::channel_data(channel.id(), Value::Bytes(b"hello\nworld".to_vec())),
        )
        .await
        .unwrap();
        nexus_wire::write_message(&peer_io, nexus_wire::Message::channel_close(channel.id()))
            .await
            .unwrap();

        let first = file.readline().await.unwrap();
        assert_eq!(first, b"hello\n");
        let second = file.readline().await.unwrap();
        assert_eq!(second, b"world");
    }
}
