use std::fmt;

use nexus_session::ChannelError;

/// Everything that can go wrong registering or bootstrapping a gateway in a
/// [`crate::Group`].
#[derive(Debug)]
pub enum GroupError {
    /// Registration requires the gateway id be unique within the group.
    DuplicateId(String),
    /// The chdir/nice bootstrap channel failed before confirming.
    Bootstrap(ChannelError),
}

impl fmt::Display for GroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupError::DuplicateId(id) => write!(f, "gateway id {id:?} is already registered in this group"),
            GroupError::Bootstrap(e) => write!(f, "gateway bootstrap failed: {e}"),
        }
    }
}

impl std::error::Error for GroupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GroupError::Bootstrap(e) => Some(e),
            GroupError::DuplicateId(_) => None,
        }
    }
}

impl From<ChannelError> for GroupError {
    fn from(e: ChannelError) -> Self {
        GroupError::Bootstrap(e)
    }
}
