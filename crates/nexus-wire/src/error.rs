use std::fmt;

use nexus_codec::{DecodeError, EncodeError};
use nexus_transport::TransportError;

use crate::message::UnknownMessageKind;

/// Everything that can go wrong reading or writing a frame.
#[derive(Debug)]
pub enum WireError {
    Transport(TransportError),
    Decode(DecodeError),
    Encode(EncodeError),
    UnknownKind(UnknownMessageKind),
    MalformedFrame(&'static str),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Transport(e) => write!(f, "{e}"),
            WireError::Decode(e) => write!(f, "{e}"),
            WireError::Encode(e) => write!(f, "{e}"),
            WireError::UnknownKind(e) => write!(f, "{e}"),
            WireError::MalformedFrame(why) => write!(f, "malformed frame: {why}"),
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireError::Transport(e) => Some(e),
            WireError::Decode(e) => Some(e),
            WireError::Encode(e) => Some(e),
            WireError::UnknownKind(e) => Some(e),
            WireError::MalformedFrame(_) => None,
        }
    }
}

impl From<TransportError> for WireError {
    fn from(e: TransportError) -> Self {
        WireError::Transport(e)
    }
}

impl From<DecodeError> for WireError {
    fn from(e: DecodeError) -> Self {
        WireError::Decode(e)
    }
}

impl From<EncodeError> for WireError {
    fn from(e: EncodeError) -> Self {
        WireError::Encode(e)
    }
}

impl WireError {
    /// True if the receiver loop should treat this as end-of-stream rather
    /// than a malformed-frame error: a *clean* EOF on the very first byte of
    /// a frame is the ordinary shutdown path, not corruption, even though
    /// corrupt or truncated frames still terminate the receiver loop.
    pub fn is_clean_eof(&self) -> bool {
        matches!(self, WireError::Transport(TransportError::Eof))
    }
}
