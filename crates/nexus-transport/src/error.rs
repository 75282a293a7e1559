use std::fmt;

/// Transport-layer failure. A receiver loop treats any of these as fatal and
/// tears the gateway down.
#[derive(Debug)]
pub enum TransportError {
    /// An operation was attempted after `close_read`/`close_write`/`close`.
    Closed,
    /// The peer closed the stream (clean or otherwise) before the requested
    /// number of bytes arrived.
    Eof,
    /// The underlying stream returned an I/O error.
    Io(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "transport is closed"),
            TransportError::Eof => write!(f, "end of stream"),
            TransportError::Io(e) => write!(f, "transport I/O error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Eof
        } else {
            TransportError::Io(e)
        }
    }
}
