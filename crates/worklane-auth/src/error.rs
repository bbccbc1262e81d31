//! Error types for credential operations

/// Errors from token refresh and credential storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(String),

    #[error("refresh token rejected: {0}")]
    RefreshRejected(String),

    #[error("no credentials available: {0}")]
    NoCredentials(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the stored refresh token is permanently unusable.
    ///
    /// Transport failures and 5xx responses can succeed on a later attempt;
    /// a 401/403 from the refresh endpoint cannot.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Error::RefreshRejected(_) | Error::NoCredentials(_))
    }
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
