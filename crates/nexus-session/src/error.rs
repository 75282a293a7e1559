use std::fmt;

use nexus_wire::WireError;

/// The peer reported a failure while running our source text or while
/// delivering a message; carries the formatted error text the peer sent
/// in a `CHANNEL_CLOSE_ERROR` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError(pub String);

impl RemoteError {
    pub fn new(text: impl Into<String>) -> Self {
        RemoteError(text.into())
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote error: {}", self.0)
    }
}

impl std::error::Error for RemoteError {}

/// Everything a [`crate::Channel`] operation can fail with.
#[derive(Debug)]
pub enum ChannelError {
    /// No more items will ever arrive and no remote error was reported.
    EndOfStream,
    /// The peer closed the channel with an error.
    Remote(RemoteError),
    /// `receive()` was called on a channel that has a callback installed.
    CallbackInstalled,
    /// `set_callback()` was called twice on the same channel.
    CallbackAlreadyInstalled,
    /// The gateway's channel factory is no longer accepting new channels.
    FactoryFinished,
    /// `send()` was called on a channel that has already reached `Closed`.
    AlreadyClosed,
    /// `wait_close()` timed out before the channel finished.
    Timeout,
    /// The underlying frame transport failed.
    Wire(WireError),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::EndOfStream => write!(f, "end of stream"),
            ChannelError::Remote(e) => write!(f, "{e}"),
            ChannelError::CallbackInstalled => {
                write!(f, "receive() is unavailable: a callback is installed on this channel")
            }
            ChannelError::CallbackAlreadyInstalled => {
                write!(f, "a callback is already installed on this channel")
            }
            ChannelError::FactoryFinished => write!(f, "gateway is shutting down, no new channels"),
            ChannelError::AlreadyClosed => write!(f, "cannot send to an already-closed channel"),
            ChannelError::Timeout => write!(f, "timed out waiting for channel to close"),
            ChannelError::Wire(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChannelError::Remote(e) => Some(e),
            ChannelError::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WireError> for ChannelError {
    fn from(e: WireError) -> Self {
        ChannelError::Wire(e)
    }
}
