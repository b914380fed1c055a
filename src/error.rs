//! Error types for the gateway.

use thiserror::Error;

/// Main error type for gateway startup and configuration.
///
/// Rejected requests are not errors: a denied request is an ordinary
/// [`RateLimitDecision`](crate::rate_limit::RateLimitDecision).
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Window length of zero milliseconds
    #[error("Configuration error: rate window must be greater than zero")]
    InvalidWindow,

    /// Request limit of zero
    #[error("Configuration error: rate limit must be greater than zero")]
    InvalidLimit,

    /// Trust-proxy value that is neither a boolean nor a hop count
    #[error("Configuration error: invalid trust-proxy value {0:?}")]
    InvalidTrustProxy(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
