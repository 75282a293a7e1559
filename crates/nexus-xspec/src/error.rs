use std::fmt;

/// A malformed `ExecSpec` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecSpecError {
    Empty,
    DuplicateKey(String),
    MissingEnvName(String),
}

impl fmt::Display for ExecSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecSpecError::Empty => write!(f, "exec spec string is empty"),
            ExecSpecError::DuplicateKey(key) => write!(f, "duplicate key in exec spec: {key}"),
            ExecSpecError::MissingEnvName(segment) => {
                write!(f, "env key with no variable name: {segment}")
            }
        }
    }
}

impl std::error::Error for ExecSpecError {}
