use std::fmt;

use nexus_codec::Value;

/// The five message kinds, with stable numeric tags for the wire.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Source text to execute on the peer.
    ChannelOpen = 0,
    /// Integer id of a newly created sub-channel.
    ChannelNew = 1,
    /// An arbitrary codec value.
    ChannelData = 2,
    /// Empty payload; graceful close.
    ChannelClose = 3,
    /// Text of the remote error.
    ChannelCloseError = 4,
    /// Empty payload; sender is done but receiver may still have data.
    ChannelLastMessage = 5,
}

impl MessageKind {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => MessageKind::ChannelOpen,
            1 => MessageKind::ChannelNew,
            2 => MessageKind::ChannelData,
            3 => MessageKind::ChannelClose,
            4 => MessageKind::ChannelCloseError,
            5 => MessageKind::ChannelLastMessage,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::ChannelOpen => "CHANNEL_OPEN",
            MessageKind::ChannelNew => "CHANNEL_NEW",
            MessageKind::ChannelData => "CHANNEL_DATA",
            MessageKind::ChannelClose => "CHANNEL_CLOSE",
            MessageKind::ChannelCloseError => "CHANNEL_CLOSE_ERROR",
            MessageKind::ChannelLastMessage => "CHANNEL_LAST_MESSAGE",
        };
        write!(f, "{name}")
    }
}

/// An unknown tag arrived where a [`MessageKind`] was expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMessageKind(pub u8);

impl fmt::Display for UnknownMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message kind tag: {}", self.0)
    }
}

impl std::error::Error for UnknownMessageKind {}

/// One frame on the wire: `(kind, channel_id, payload)`, encoded by
/// `nexus-codec` as a 3-tuple.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub channel_id: i32,
    pub payload: Value,
}

impl Message {
    pub fn channel_open(channel_id: i32, source: impl Into<String>) -> Self {
        Message {
            kind: MessageKind::ChannelOpen,
            channel_id,
            payload: Value::Text(source.into()),
        }
    }

    pub fn channel_new(channel_id: i32, new_id: i32) -> Self {
        Message {
            kind: MessageKind::ChannelNew,
            channel_id,
            payload: Value::Int(new_id),
        }
    }

    pub fn channel_data(channel_id: i32, value: Value) -> Self {
        Message {
            kind: MessageKind::ChannelData,
            channel_id,
            payload: value,
        }
    }

    pub fn channel_close(channel_id: i32) -> Self {
        Message {
            kind: MessageKind::ChannelClose,
            channel_id,
            payload: Value::None,
        }
    }

    pub fn channel_close_error(channel_id: i32, text: impl Into<String>) -> Self {
        Message {
            kind: MessageKind::ChannelCloseError,
            channel_id,
            payload: Value::Text(text.into()),
        }
    }

    pub fn channel_last_message(channel_id: i32) -> Self {
        Message {
            kind: MessageKind::ChannelLastMessage,
            channel_id,
            payload: Value::None,
        }
    }

    /// Turn this message into the 3-tuple the codec actually encodes.
    pub(crate) fn into_tuple_value(self) -> Value {
        Value::Tuple(vec![
            Value::Int(self.kind.as_u8() as i32),
            Value::Int(self.channel_id),
            self.payload,
        ])
    }

    pub(crate) fn from_tuple_value(value: Value) -> Result<Self, crate::WireError> {
        let Value::Tuple(mut items) = value else {
            return Err(crate::WireError::MalformedFrame("top-level value is not a tuple"));
        };
        if items.len() != 3 {
            return Err(crate::WireError::MalformedFrame("frame tuple must have 3 elements"));
        }
        let payload = items.pop().unwrap();
        let Value::Int(channel_id) = items.pop().unwrap() else {
            return Err(crate::WireError::MalformedFrame("channel id is not an int"));
        };
        let Value::Int(tag) = items.pop().unwrap() else {
            return Err(crate::WireError::MalformedFrame("message kind tag is not an int"));
        };
        let kind = MessageKind::from_u8(tag as u8)
            .ok_or(crate::WireError::UnknownKind(UnknownMessageKind(tag as u8)))?;
        Ok(Message {
            kind,
            channel_id,
            payload,
        })
    }
}
