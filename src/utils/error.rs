//! Error types and handling
//!
//! Common error types used across the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to allocate writer: {0}")]
    WriterAllocationFailed(String),

    #[error("Failed to finalize writer: {0}")]
    WriterFinalizeFailed(String),

    #[error("Failed to save preview: {0}")]
    SaveFailed(String),

    #[error("Share unavailable: {0}")]
    ShareUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error response for the host application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl RecorderError {
    /// Stable error code reported to the host
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            RecorderError::WriterAllocationFailed(_) => "WRITER_ALLOCATION_FAILED",
            RecorderError::WriterFinalizeFailed(_) => "WRITER_FINALIZE_FAILED",
            RecorderError::SaveFailed(_) => "SAVE_FAILED",
            RecorderError::ShareUnavailable(_) => "SHARE_UNAVAILABLE",
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<RecorderError> for ErrorResponse {
    fn from(error: RecorderError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;
