use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The request was rejected by the provider (bad payload, auth, etc.).
    InvalidRequest,
    /// The connection broke or the payload could not be decoded.
    Transport,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "Moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ErrorKind::InvalidRequest => write!(f, "Invalid request"),
            ErrorKind::Transport => write!(f, "Transport error"),
            ErrorKind::Other => write!(f, "Other error"),
        }
    }
}
