use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use nexus_wire::Value;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Notify;

use crate::error::{ChannelError, RemoteError};
use crate::factory::ChannelFactory;

/// Where a channel sits in its lifecycle.
///
/// `Opened -> SendOnly` happens when the peer signals it has no more data
/// for us but will keep accepting ours (`CHANNEL_LAST_MESSAGE`). Either
/// state transitions to `Closed` when both directions are done; the
/// `Deleted` transition has no explicit state here, it is the moment the
/// last [`Channel`] handle is dropped (see `ChannelInner`'s `Drop` impl).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Opened,
    SendOnly,
    Closed,
}

/// One item taken off a channel: either a plain value, or a reference to a
/// new sub-channel the peer opened on our behalf (`CHANNEL_NEW`). Channels
/// cannot be embedded in [`Value`] itself, so this is a second, wider item
/// type layered on top of it.
#[derive(Debug, Clone)]
pub enum ChannelItem {
    Value(Value),
    Channel(Channel),
}

impl From<Value> for ChannelItem {
    fn from(v: Value) -> Self {
        ChannelItem::Value(v)
    }
}

/// Anything a [`Channel::send`] can carry: a value, or a reference to
/// another channel (sent as a `CHANNEL_NEW` naming its id).
pub enum Sendable {
    Value(Value),
    Channel(Channel),
}

impl From<Value> for Sendable {
    fn from(v: Value) -> Self {
        Sendable::Value(v)
    }
}

impl From<Channel> for Sendable {
    fn from(c: Channel) -> Self {
        Sendable::Channel(c)
    }
}

impl From<&Channel> for Sendable {
    fn from(c: &Channel) -> Self {
        Sendable::Channel(c.clone())
    }
}

pub(crate) enum QueueItem {
    Data(ChannelItem),
    /// Sentinel meaning "no more data"; re-queued after being read so every
    /// caller of `receive()` keeps observing it (mirrors the Python
    /// implementation re-enqueuing its ENDMARKER).
    End,
}

pub(crate) struct ChannelInner {
    pub(crate) id: i32,
    pub(crate) factory: Arc<ChannelFactory>,
    pub(crate) state: SyncMutex<ChannelState>,
    pub(crate) remote_errors: SyncMutex<Vec<RemoteError>>,
    pub(crate) items: SyncMutex<VecDeque<QueueItem>>,
    pub(crate) item_notify: Notify,
    pub(crate) close_notify: Notify,
}

impl ChannelInner {
    pub(crate) fn push_item(&self, item: QueueItem) {
        self.items.lock().push_back(item);
        self.item_notify.notify_waiters();
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        let state = *self.state.lock();
        match state {
            ChannelState::Closed => {
                for err in self.remote_errors.lock().iter() {
                    tracing::warn!(channel_id = self.id, %err, "channel dropped with an unread remote error");
                }
            }
            ChannelState::SendOnly => {}
            ChannelState::Opened => {
                let has_callback = self.factory.has_callback(self.id);
                let msg = if has_callback {
                    nexus_wire::Message::channel_last_message(self.id)
                } else {
                    nexus_wire::Message::channel_close(self.id)
                };
                self.factory.enqueue(msg);
                self.factory.forget(self.id);
            }
        }
    }
}

/// A cheap-to-clone handle onto one multiplexed channel. Dropping the last
/// clone releases the channel: if it was still open this sends a close
/// message to the peer, mirroring the explicit `release()` a garbage
/// collected implementation would call on finalization.
#[derive(Clone)]
pub struct Channel(pub(crate) Arc<ChannelInner>);

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

impl Channel {
    pub fn id(&self) -> i32 {
        self.0.id
    }

    pub fn state(&self) -> ChannelState {
        *self.0.state.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ChannelState::Closed
    }

    /// Send a value, or a reference to another channel, to the peer. Fails
    /// if the channel has already reached `Closed`; a channel in `SendOnly`
    /// (the peer is done sending, but still accepting) may still send.
    pub async fn send(&self, item: impl Into<Sendable>) -> Result<(), ChannelError> {
        if self.state() == ChannelState::Closed {
            return Err(ChannelError::AlreadyClosed);
        }
        let msg = match item.into() {
            Sendable::Value(v) => nexus_wire::Message::channel_data(self.id(), v),
            Sendable::Channel(other) => nexus_wire::Message::channel_new(self.id(), other.id()),
        };
        self.0.factory.enqueue(msg);
        Ok(())
    }

    /// Take the next item, blocking until one arrives. Errors if a callback
    /// is installed (the two delivery modes are mutually exclusive) or once
    /// the channel is drained and closed.
    pub async fn receive(&self) -> Result<ChannelItem, ChannelError> {
        if self.0.factory.has_callback(self.id()) {
            return Err(ChannelError::CallbackInstalled);
        }
        loop {
            if let Some(item) = self.try_take_front() {
                return item;
            }
            let notified = self.0.item_notify.notified();
            if let Some(item) = self.try_take_front() {
                return item;
            }
            notified.await;
        }
    }

    fn try_take_front(&self) -> Option<Result<ChannelItem, ChannelError>> {
        let mut items = self.0.items.lock();
        match items.pop_front() {
            Some(QueueItem::Data(item)) => Some(Ok(item)),
            Some(QueueItem::End) => {
                items.push_front(QueueItem::End);
                drop(items);
                Some(Err(self.end_of_stream_error()))
            }
            None => None,
        }
    }

    fn end_of_stream_error(&self) -> ChannelError {
        let mut errors = self.0.remote_errors.lock();
        match errors.pop() {
            Some(err) => ChannelError::Remote(err),
            None => ChannelError::EndOfStream,
        }
    }

    /// Install a callback invoked for every future item (and, once, for
    /// `endmarker` when the channel closes). Drains anything already queued
    /// through it first, serialized against the gateway's receiver loop so
    /// no item is delivered twice or dropped in the handoff.
    pub async fn set_callback(
        &self,
        callback: impl Fn(ChannelItem) + Send + Sync + 'static,
        endmarker: Option<Value>,
    ) -> Result<(), ChannelError> {
        let _guard = self.0.factory.receive_lock.lock().await;
        if self.0.factory.has_callback(self.id()) {
            return Err(ChannelError::CallbackAlreadyInstalled);
        }
        let callback: Arc<dyn Fn(ChannelItem) + Send + Sync> = Arc::new(callback);
        let mut backlog = Vec::new();
        let mut saw_end = false;
        {
            let mut items = self.0.items.lock();
            while let Some(item) = items.pop_front() {
                match item {
                    QueueItem::Data(data) => backlog.push(data),
                    QueueItem::End => {
                        saw_end = true;
                        items.push_front(QueueItem::End);
                        break;
                    }
                }
            }
        }
        for data in backlog {
            callback(data);
        }
        if saw_end {
            if let Some(marker) = endmarker {
                callback(ChannelItem::Value(marker));
            }
            return Ok(());
        }
        self.0.factory.install_callback(self.id(), callback, endmarker);
        Ok(())
    }

    /// Close the channel, optionally reporting `error` to the peer as the
    /// reason. A no-op if the channel is already closed.
    pub async fn close(&self, error: Option<String>) -> Result<(), ChannelError> {
        let mut state = self.0.state.lock();
        if *state == ChannelState::Closed {
            return Ok(());
        }
        *state = ChannelState::Closed;
        drop(state);
        let msg = match &error {
            Some(text) => nexus_wire::Message::channel_close_error(self.id(), text.clone()),
            None => nexus_wire::Message::channel_close(self.id()),
        };
        self.0.factory.enqueue(msg);
        self.0.item_notify.notify_waiters();
        self.0.close_notify.notify_waiters();
        Ok(())
    }

    /// Wait until the channel reaches `Closed`, or until `timeout` elapses.
    /// If the channel closed because the peer reported an error, that error
    /// is re-raised here rather than silently swallowed.
    pub async fn wait_close(&self, timeout: Option<Duration>) -> Result<(), ChannelError> {
        loop {
            if self.is_closed() {
                return self.remote_error_result();
            }
            let notified = self.0.close_notify.notified();
            if self.is_closed() {
                return self.remote_error_result();
            }
            match timeout {
                Some(d) => tokio::time::timeout(d, notified)
                    .await
                    .map_err(|_| ChannelError::Timeout)?,
                None => notified.await,
            }
        }
    }

    /// Non-destructive peek at the most recent remote error, if any. Unlike
    /// `receive()`'s end-of-stream path, `wait_close()` doesn't consume the
    /// channel's items, so repeated calls keep observing the same error.
    fn remote_error_result(&self) -> Result<(), ChannelError> {
        match self.0.remote_errors.lock().last() {
            Some(err) => Err(ChannelError::Remote(err.clone())),
            None => Ok(()),
        }
    }

    pub fn send_blocking(&self, item: impl Into<Sendable>) -> Result<(), ChannelError> {
        tokio::runtime::Handle::current().block_on(self.send(item))
    }

    pub fn receive_blocking(&self) -> Result<ChannelItem, ChannelError> {
        tokio::runtime::Handle::current().block_on(self.receive())
    }

    pub fn close_blocking(&self, error: Option<String>) -> Result<(), ChannelError> {
        tokio::runtime::Handle::current().block_on(self.close(error))
    }
}
