//! Channel multiplexing over a [`nexus_transport::Transport`]: the
//! `Channel` lifecycle state machine, the `Gateway` that drives a receiver
//! and writer task pair, and the `RemoteExecutor` seam that stands in for
//! "run this source text on the peer."

mod channel;
mod error;
mod executor;
mod factory;
mod file;
mod gateway;

pub use channel::{Channel, ChannelItem, ChannelState, Sendable};
pub use error::{ChannelError, RemoteError};
pub use executor::{EchoExecutor, RemoteExecutor};
pub use factory::ChannelFactory;
pub use file::{ChannelFile, FileMode};
pub use gateway::{Gateway, Side};

pub use nexus_wire::{DialectOptions, Value};
