//! Error types module
//!
//! Failures in the ingestion pipeline are never fatal to a session. They are
//! classified by `PipelineError`, which also tells callers how loudly to log
//! them and what to show the user. Component-level errors (`ValidationError`,
//! `DecodeError`) convert into it.

use crate::preview::DecodeError;
use crate::validator::Rejection;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a failed upload
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    ValidationRejected(Rejection),

    #[error("Decode failed: {0}")]
    DecodeFailed(#[from] DecodeError),

    #[error("Upload failed: {0}")]
    TransportFailed(String),

    #[error("Nothing to process")]
    EmptyInput,
}

impl From<Rejection> for PipelineError {
    fn from(rejection: Rejection) -> Self {
        PipelineError::ValidationRejected(rejection)
    }
}

impl PipelineError {
    /// Machine-readable error code (e.g., "TRANSPORT_FAILED")
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::ValidationRejected(_) => "VALIDATION_REJECTED",
            PipelineError::DecodeFailed(_) => "DECODE_FAILED",
            PipelineError::TransportFailed(_) => "TRANSPORT_FAILED",
            PipelineError::EmptyInput => "EMPTY_INPUT",
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            PipelineError::ValidationRejected(_) | PipelineError::EmptyInput => LogLevel::Debug,
            PipelineError::DecodeFailed(DecodeError::Aborted { .. }) => LogLevel::Error,
            PipelineError::DecodeFailed(_) | PipelineError::TransportFailed(_) => LogLevel::Warn,
        }
    }

    /// Whether the user can recover by adding the files again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PipelineError::EmptyInput)
    }

    /// Emit this error through `tracing` at its own log level.
    pub fn log(&self) {
        let code = self.error_code();
        match self.log_level() {
            LogLevel::Debug => tracing::debug!(error_code = code, error = %self, "pipeline issue"),
            LogLevel::Warn => tracing::warn!(error_code = code, error = %self, "pipeline issue"),
            LogLevel::Error => tracing::error!(error_code = code, error = %self, "pipeline issue"),
        }
    }
}
