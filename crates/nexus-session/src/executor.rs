use nexus_wire::Value;

use crate::channel::{Channel, ChannelItem};
use crate::error::ChannelError;

/// Runs the source text named by an inbound `CHANNEL_OPEN` against the
/// channel it arrived on. Rust has no runtime source interpreter to stand
/// in for the peer half of the wire protocol, so this trait is the seam a
/// caller plugs real behaviour into; `source` is passed through unexamined.
///
/// Implementations run on a blocking thread (see [`crate::Gateway::serve`]),
/// so they may call the `_blocking` family of [`Channel`] methods freely.
pub trait RemoteExecutor: Send + Sync + 'static {
    fn execute(&self, channel: Channel, source: &str) -> Result<(), String>;
}

/// Echoes every value it receives back to the sender, incrementing
/// integers by one. Used in tests and as a minimal worked example of a
/// [`RemoteExecutor`]; ignores `source` entirely.
pub struct EchoExecutor;

impl RemoteExecutor for EchoExecutor {
    fn execute(&self, channel: Channel, _source: &str) -> Result<(), String> {
        loop {
            match channel.receive_blocking() {
                Ok(ChannelItem::Value(Value::Int(i))) => {
                    channel
                        .send_blocking(Value::Int(i + 1))
                        .map_err(|e| e.to_string())?;
                }
                Ok(ChannelItem::Value(v)) => {
                    channel.send_blocking(v).map_err(|e| e.to_string())?;
                }
                Ok(ChannelItem::Channel(_)) => {
                    return Err("EchoExecutor cannot echo a channel reference".into());
                }
                Err(ChannelError::EndOfStream) => return Ok(()),
                Err(e) => return Err(e.to_string()),
            }
        }
    }
}
