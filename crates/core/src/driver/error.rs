use cinescout_model::{ErrorKind, ModelResponseStatus};
use thiserror::Error;

use crate::model_client::ModelError;

/// Why a conversation turn couldn't be answered.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The conversation is longer than the driver accepts.
    #[error("conversation has {count} messages, the limit is {max}")]
    MessageLimit {
        /// Number of messages in the request.
        count: usize,
        /// The configured limit.
        max: usize,
    },
    /// The model provider failed.
    #[error("model request failed: {}", .0.message)]
    Model(#[from] ModelError),
    /// The model finished without completing its response.
    #[error("model response {0}")]
    ModelStatus(ModelResponseStatus),
    /// The final answer didn't match the expected schema.
    #[error("model returned a malformed answer: {0}")]
    MalformedAnswer(String),
}

impl DriverError {
    /// Returns `true` if the failure was caused by rate limiting.
    ///
    /// Providers don't always classify rate limiting, so the error text is
    /// checked as well.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            DriverError::Model(err) => {
                err.kind == ErrorKind::RateLimitExceeded
                    || looks_rate_limited(&err.message)
            }
            _ => false,
        }
    }
}

fn looks_rate_limited(message: &str) -> bool {
    let message = message.to_lowercase();
    ["rate limit", "rate_limit", "429", "too many requests"]
        .iter()
        .any(|needle| message.contains(needle))
}
