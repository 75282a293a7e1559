//! Message framing: the five message kinds and their `(kind, channel_id,
//! payload)` encoding over a [`nexus_transport::Transport`].

mod error;
mod message;
mod stream;

pub use error::WireError;
pub use message::{Message, MessageKind, UnknownMessageKind};
pub use stream::{read_message, write_message};

pub use nexus_codec::{DialectOptions, Value};
