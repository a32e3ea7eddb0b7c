use thiserror::Error;

/// Errors returned by a [`crate::MediaCatalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog rejected the request because of rate limiting.
    #[error("catalog rate limit exceeded")]
    RateLimited,
    /// The catalog answered with an unexpected HTTP status.
    #[error("catalog returned status {0}")]
    Status(u16),
    /// The request could not be sent or the connection broke.
    #[error("catalog request failed: {0}")]
    Transport(String),
    /// The response body could not be decoded.
    #[error("failed to decode catalog response: {0}")]
    Decode(String),
    /// The query was rejected before being sent.
    #[error("invalid catalog query: {0}")]
    InvalidQuery(String),
}
