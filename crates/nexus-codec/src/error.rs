use std::fmt;

/// Raised when a [`Value`](crate::Value) cannot be put on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// An `i32`-range check still failed (defensive; `i32` always fits, kept
    /// for symmetry with the length-overflow checks below).
    IntOverflow,
    /// A byte string or list was longer than `i32::MAX`.
    LengthOverflow { what: &'static str, len: usize },
    /// A text string was not valid UTF-8.
    NotUtf8,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::IntOverflow => write!(f, "integer out of range"),
            EncodeError::LengthOverflow { what, len } => {
                write!(f, "{what} is too long ({len} exceeds i32::MAX)")
            }
            EncodeError::NotUtf8 => write!(f, "string is not UTF-8 encodable"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Raised when a decoded byte stream does not represent a valid [`Value`](crate::Value).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The leading version byte was not the one this codec understands.
    VersionMismatch { got: u8, expected: u8 },
    /// An opcode byte did not match any known opcode.
    UnknownOpcode(u8),
    /// The stream ended before a complete value could be decoded.
    Truncated,
    /// SETITEM (or BUILDTUPLE) was asked to pop more items than were on the
    /// stack.
    StackUnderflow,
    /// After STOP, the stack did not contain exactly one finished value.
    TrailingStack { remaining: usize },
    /// A `u`/`t` payload was not valid UTF-8.
    NotUtf8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::VersionMismatch { got, expected } => {
                write!(f, "version mismatch: {got} != {expected}")
            }
            DecodeError::UnknownOpcode(op) => {
                write!(f, "unknown opcode {:?}", *op as char)
            }
            DecodeError::Truncated => write!(f, "stream ended before a value was complete"),
            DecodeError::StackUnderflow => write!(f, "not enough items on the stack"),
            DecodeError::TrailingStack { remaining } => {
                write!(f, "internal decode error: {remaining} items left on stack after STOP")
            }
            DecodeError::NotUtf8 => write!(f, "string payload is not valid UTF-8"),
        }
    }
}

impl std::error::Error for DecodeError {}
