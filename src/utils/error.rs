//! Error types and handling
//!
//! Crate-wide error type wrapping the per-component errors.

use crate::player::PlaybackError;
use crate::recorder::RecordingError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Error response for a host UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<ReplayError> for ErrorResponse {
    fn from(error: ReplayError) -> Self {
        let code = match &error {
            ReplayError::Io(_) => "IO_ERROR",
            ReplayError::Serialization(_) => "SERIALIZATION_ERROR",
            ReplayError::Recording(RecordingError::AlreadyRecording(_)) => "ALREADY_RECORDING",
            ReplayError::Recording(RecordingError::NotRecording) => "NOT_RECORDING",
            ReplayError::Recording(RecordingError::NoData) => "NO_RECORDING_DATA",
            ReplayError::Playback(PlaybackError::NoRecordingLoaded) => "NO_RECORDING_LOADED",
            ReplayError::Playback(PlaybackError::NoRuntime) => "NO_RUNTIME",
            ReplayError::Store(StoreError::NotFound(_)) => "REPLAY_NOT_FOUND",
            ReplayError::Store(_) => "STORE_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using ReplayError
pub type ReplayResult<T> = Result<T, ReplayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let response: ErrorResponse = ReplayError::from(RecordingError::NotRecording).into();
        assert_eq!(response.code, "NOT_RECORDING");
        assert_eq!(response.message, "Recording error: not recording");

        let response: ErrorResponse = ReplayError::from(PlaybackError::NoRecordingLoaded).into();
        assert_eq!(response.code, "NO_RECORDING_LOADED");

        let response: ErrorResponse =
            ReplayError::from(StoreError::NotFound("abc".to_string())).into();
        assert_eq!(response.code, "REPLAY_NOT_FOUND");
        assert_eq!(response.message, "Store error: Replay not found: abc");
    }
}
