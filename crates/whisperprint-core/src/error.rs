//! Error types for WhisperPrint.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Request rejected before any encode/decode/scan work.
    #[error("Validation error: {0}")]
    Validation(String),

    /// File type the text extractor cannot handle.
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Recipient revoked: {0}")]
    Revoked(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller can fix the request (as opposed to a server fault).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnsupportedContent(_)
                | Self::NotFound(_)
                | Self::Revoked(_)
                | Self::Conflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reject empty or whitespace-only input fields.
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
