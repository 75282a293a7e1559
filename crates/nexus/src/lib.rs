//! An elastic remote-execution fabric: bootstrap peer interpreters over any
//! byte-stream transport, then exchange typed messages with them over
//! multiplexed, bidirectional channels.
//!
//! ```text
//! nexus-codec     the wire value format (a closed Value enum, stack-machine codec)
//! nexus-transport a byte-stream transport abstraction (AsyncRead+AsyncWrite, or in-memory)
//! nexus-wire      frames: (kind, channel_id, payload) messages over a Transport
//! nexus-session   Channel/Gateway: the multiplexer, its lifecycle, its receiver loop
//! nexus-xspec     the "popen//chdir=/tmp" gateway configuration mini-language
//! nexus-group     Group/MultiChannel: own many gateways, tear them down together
//! ```
//!
//! This crate just re-exports the above for callers who want the whole
//! stack under one name.

pub use nexus_codec::{self as codec, DecodeError, EncodeError};
pub use nexus_group::{
    new_tracked_group, run_exit_hooks, AnyGateway, ExecSpec, ExecSpecError, GatewayId, Group,
    GroupError, Killable, MultiChannel,
};
pub use nexus_session::{
    Channel, ChannelError, ChannelFile, ChannelItem, ChannelState, DialectOptions, EchoExecutor,
    FileMode, Gateway, RemoteError, RemoteExecutor, Sendable, Side, Value,
};
pub use nexus_transport::{IoTransport, MemTransport, Transport, TransportError};
pub use nexus_wire::{Message, MessageKind, WireError};
