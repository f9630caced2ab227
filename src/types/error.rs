//! Error types for Chainhub
//!
//! Every failure in the store, hasher and token layers is translated into
//! exactly one of these kinds before it reaches a caller.

use hyper::StatusCode;

/// Main error type for Chainhub operations
#[derive(Debug, thiserror::Error)]
pub enum ChainhubError {
    /// Malformed or missing input the caller can correct
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing, invalid or expired token, or a failed credential check
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource absent, or not owned by the caller on ownership-scoped paths
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness conflict on create
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Storage or hashing failure unrelated to caller input
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChainhubError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Duplicate(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to show to the caller.
    ///
    /// Internal causes (SQL errors, hasher failures) stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg)
            | Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::Duplicate(msg) => msg.clone(),
            Self::Internal(_) | Self::Config(_) => "internal server error".to_string(),
        }
    }
}

impl From<std::io::Error> for ChainhubError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<hyper::Error> for ChainhubError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

// Uniqueness conflicts are mapped in the store before this conversion
// is reached, so anything arriving here is an internal failure.
impl From<rusqlite::Error> for ChainhubError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Internal(format!("Database error: {}", err))
    }
}

impl From<tokio::task::JoinError> for ChainhubError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Store task failed: {}", err))
    }
}
