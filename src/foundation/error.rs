pub type ZarrResult<T> = Result<T, ZarrError>;

#[derive(thiserror::Error, Debug)]
pub enum ZarrError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("will not overwrite: {0}")]
    WillNotOverwrite(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ZarrError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn will_not_overwrite(msg: impl Into<String>) -> Self {
        Self::WillNotOverwrite(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<std::io::Error> for ZarrError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Coarse status classification for FFI-style callers that cannot carry a
/// structured error across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    InvalidArgument,
    WillNotOverwrite,
    IOError,
    InternalError,
}

impl From<&ZarrError> for StatusCode {
    fn from(err: &ZarrError) -> Self {
        match err {
            ZarrError::InvalidArgument(_) | ZarrError::Unsupported(_) => Self::InvalidArgument,
            ZarrError::Io(_) => Self::IOError,
            ZarrError::WillNotOverwrite(_) => Self::WillNotOverwrite,
            ZarrError::Codec(_)
            | ZarrError::Precondition(_)
            | ZarrError::Internal(_)
            | ZarrError::Other(_) => Self::InternalError,
        }
    }
}

impl StatusCode {
    /// Collapse a result into the status a C-style caller would observe.
    pub fn of<T>(result: &ZarrResult<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => Self::from(err),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
