//! Error taxonomy for API requests
//!
//! Failed requests keep their original server semantics: the variants carry
//! the response body (and status where it is not implied by the variant) so
//! callers see exactly what the server said, whether or not a refresh and
//! replay happened in between.

/// Error type for every request issued through the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No response was received: DNS, connect, TLS, or timeout failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the request's credentials (401).
    #[error("unauthenticated: {body}")]
    Unauthenticated { body: String },

    /// The caller is authenticated but not allowed (403).
    #[error("forbidden: {body}")]
    Forbidden { body: String },

    /// The caller is being throttled (429). `retry_after` carries the
    /// server's hint in seconds when one was sent.
    #[error("rate limited: {body}")]
    RateLimited {
        retry_after: Option<u64>,
        body: String,
    },

    /// Any other non-success status, surfaced unchanged.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The token refresh itself failed; the session is over and local
    /// credentials have been cleared.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    /// Invalid configuration or request construction.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status associated with this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthenticated { .. } => Some(401),
            Error::Forbidden { .. } => Some(403),
            Error::RateLimited { .. } => Some(429),
            Error::Status { status, .. } => Some(*status),
            Error::Network(_) | Error::RefreshFailed(_) | Error::Config(_) => None,
        }
    }

    /// True when retrying the same request cannot succeed without a new
    /// session (the refresh path is exhausted or was rejected).
    pub fn is_session_over(&self) -> bool {
        matches!(self, Error::RefreshFailed(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
