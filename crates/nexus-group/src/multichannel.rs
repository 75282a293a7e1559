use std::time::Duration;

use nexus_session::{Channel, ChannelError, ChannelItem, Value};
use tokio::sync::mpsc;

/// A bundle of channels, one per gateway, opened by the same
/// [`crate::Group::remote_exec_each`] call. Fans sends out to every member
/// and lets callers wait for every member to finish without hand-rolling
/// the fan-out each time.
pub struct MultiChannel {
    channels: Vec<Channel>,
}

impl MultiChannel {
    pub fn new(channels: Vec<Channel>) -> Self {
        MultiChannel { channels }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send the same value to every member channel. Returns the first error
    /// encountered, if any, after attempting delivery to all of them.
    pub async fn send_each(&self, value: Value) -> Result<(), ChannelError> {
        let mut first_err = None;
        for channel in &self.channels {
            if let Err(e) = channel.send(value.clone()).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Receive one item from every member channel, in member order.
    pub async fn receive_each(&self) -> Vec<Result<ChannelItem, ChannelError>> {
        let mut results = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            results.push(channel.receive().await);
        }
        results
    }

    /// Wait for every member channel to close, or for `timeout` to elapse.
    pub async fn wait_all_close(&self, timeout: Option<Duration>) -> Result<(), ChannelError> {
        for channel in &self.channels {
            channel.wait_close(timeout).await?;
        }
        Ok(())
    }

    /// Install a callback on every member channel that funnels `(channel,
    /// item)` pairs into one shared queue, rather than polling each channel
    /// in turn. If `endmarker` is given, each channel pushes it exactly once
    /// when it closes, the same guarantee `Channel::set_callback` gives a
    /// single channel.
    pub async fn make_receive_queue(
        &self,
        endmarker: Option<Value>,
    ) -> Result<mpsc::UnboundedReceiver<(Channel, ChannelItem)>, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        for channel in &self.channels {
            let sender = tx.clone();
            let tagged = channel.clone();
            channel
                .set_callback(
                    move |item| {
                        let _ = sender.send((tagged.clone(), item));
                    },
                    endmarker.clone(),
                )
                .await?;
        }
        Ok(rx)
    }
}
