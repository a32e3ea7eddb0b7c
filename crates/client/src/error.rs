use thiserror::Error;

/// Why a session operation was refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The message is empty after trimming.
    #[error("message is empty")]
    EmptyMessage,
    /// The message is longer than the session accepts.
    #[error("message has {len} characters, the limit is {max}")]
    MessageTooLong {
        /// Number of characters in the message.
        len: usize,
        /// The limit.
        max: usize,
    },
    /// Sending would exceed the conversation length limit.
    #[error("conversation would have {count} messages, the limit is {max}")]
    ConversationLimit {
        /// Number of messages the request would carry.
        count: usize,
        /// The limit.
        max: usize,
    },
    /// There is no user message to retry.
    #[error("nothing to retry")]
    NothingToRetry,
    /// The session has shut down.
    #[error("session closed")]
    SessionClosed,
}

/// Why an event stream couldn't be opened or broke while reading.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection broke.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The server answered with an unexpected HTTP status.
    #[error("server returned status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TransportError::Status(status.as_u16()),
            None => TransportError::Connection(err.to_string()),
        }
    }
}
