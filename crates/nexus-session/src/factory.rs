use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use nexus_wire::Message;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use crate::channel::{Channel, ChannelInner, ChannelItem, ChannelState, QueueItem};
use crate::error::{ChannelError, RemoteError};

struct CallbackEntry {
    callback: Arc<dyn Fn(ChannelItem) + Send + Sync>,
    endmarker: Option<nexus_wire::Value>,
}

/// Shared state for every [`Channel`] a [`crate::Gateway`] hands out: id
/// allocation, the weak table used to tell whether a channel is still
/// locally referenced, and the callback table (kept separate from the
/// channel table itself, since a callback must keep firing even after every
/// local `Channel` handle for its id has been dropped).
pub struct ChannelFactory {
    channels: SyncMutex<HashMap<i32, Weak<ChannelInner>>>,
    callbacks: SyncMutex<HashMap<i32, CallbackEntry>>,
    next_id: AtomicI32,
    finished: AtomicBool,
    pub(crate) receive_lock: AsyncMutex<()>,
    outgoing: mpsc::UnboundedSender<Message>,
}

impl ChannelFactory {
    pub(crate) fn new(start_id: i32, outgoing: mpsc::UnboundedSender<Message>) -> Self {
        ChannelFactory {
            channels: SyncMutex::new(HashMap::new()),
            callbacks: SyncMutex::new(HashMap::new()),
            next_id: AtomicI32::new(start_id),
            finished: AtomicBool::new(false),
            receive_lock: AsyncMutex::new(()),
            outgoing,
        }
    }

    /// Allocate (or, for an id named by an inbound `CHANNEL_OPEN`/`CHANNEL_NEW`,
    /// register) a new channel.
    pub fn new_channel(self: &Arc<Self>, id: Option<i32>) -> Result<Channel, ChannelError> {
        if self.finished.load(Ordering::Acquire) {
            return Err(ChannelError::FactoryFinished);
        }
        let id = id.unwrap_or_else(|| self.next_id.fetch_add(2, Ordering::AcqRel));
        let inner = Arc::new(ChannelInner {
            id,
            factory: self.clone(),
            state: SyncMutex::new(ChannelState::Opened),
            remote_errors: SyncMutex::new(Vec::new()),
            items: SyncMutex::new(VecDeque::new()),
            item_notify: tokio::sync::Notify::new(),
            close_notify: tokio::sync::Notify::new(),
        });
        self.channels.lock().insert(id, Arc::downgrade(&inner));
        Ok(Channel(inner))
    }

    pub(crate) fn enqueue(&self, msg: Message) {
        // The receiving half only ever goes away once the gateway's writer
        // task has stopped, at which point the gateway itself is shutting
        // down; a dropped outgoing message at that point is expected.
        let _ = self.outgoing.send(msg);
    }

    pub(crate) fn has_callback(&self, id: i32) -> bool {
        self.callbacks.lock().contains_key(&id)
    }

    pub(crate) fn install_callback(
        &self,
        id: i32,
        callback: Arc<dyn Fn(ChannelItem) + Send + Sync>,
        endmarker: Option<nexus_wire::Value>,
    ) {
        self.callbacks.lock().insert(id, CallbackEntry { callback, endmarker });
    }

    /// Deliver one item arriving for `id`, to its callback if one is
    /// installed, otherwise to its queue. Silently dropped if the channel
    /// has no callback and no live local handle (peer sent data for a
    /// channel we already released).
    pub(crate) fn local_receive(&self, id: i32, item: ChannelItem) {
        let cb = self.callbacks.lock().get(&id).map(|e| e.callback.clone());
        if let Some(cb) = cb {
            cb(item);
            return;
        }
        let inner = self.channels.lock().get(&id).and_then(|w| w.upgrade());
        match inner {
            Some(inner) => inner.push_item(QueueItem::Data(item)),
            None => tracing::trace!(channel_id = id, "dropping item for unknown or released channel"),
        }
    }

    /// Apply a close from the peer: `sendonly` for `CHANNEL_LAST_MESSAGE`
    /// (more sends allowed locally, no more data expected), full close
    /// otherwise.
    pub(crate) fn local_close(&self, id: i32, remote_error: Option<RemoteError>, sendonly: bool) {
        let inner = self.channels.lock().get(&id).and_then(|w| w.upgrade());
        match inner {
            Some(inner) => {
                if let Some(err) = remote_error {
                    inner.remote_errors.lock().push(err);
                }
                {
                    let mut state = inner.state.lock();
                    if sendonly {
                        if *state == ChannelState::Opened {
                            *state = ChannelState::SendOnly;
                        }
                    } else {
                        *state = ChannelState::Closed;
                    }
                }
                inner.push_item(QueueItem::End);
                inner.close_notify.notify_waiters();
            }
            None => {
                if let Some(err) = remote_error {
                    tracing::warn!(channel_id = id, %err, "remote error for an already-released channel");
                }
            }
        }
        self.forget(id);
    }

    /// Remove a channel from the live table and, if it still has a
    /// callback installed, pop it and deliver its endmarker exactly once.
    pub(crate) fn forget(&self, id: i32) {
        self.channels.lock().remove(&id);
        if let Some(entry) = self.callbacks.lock().remove(&id) {
            if let Some(marker) = entry.endmarker {
                (entry.callback)(ChannelItem::Value(marker));
            }
        }
    }

    /// The gateway's receiver loop has ended: every still-open channel is
    /// force-closed as if it had received `CHANNEL_LAST_MESSAGE`, and every
    /// orphaned callback (registered for a channel with no live handle) is
    /// given its endmarker.
    pub(crate) fn finished_receiving(&self) {
        self.finished.store(true, Ordering::Release);
        let ids: Vec<i32> = self.channels.lock().keys().copied().collect();
        for id in ids {
            self.local_close(id, None, true);
        }
        let remaining: Vec<i32> = self.callbacks.lock().keys().copied().collect();
        for id in remaining {
            self.forget(id);
        }
    }
}
