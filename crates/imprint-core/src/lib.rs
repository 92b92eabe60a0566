//! Imprint Core Library
//!
//! This crate provides the domain models, error types, configuration and the
//! stateful building blocks of an Imprint session: file validation, preview
//! decoding, the upload record store, the training progress simulator with its
//! session gate, and the chat log.

pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod preview;
pub mod progress;
pub mod responder;
pub mod store;
pub mod validator;

// Re-export commonly used types
pub use chat::{ChatLog, PendingReply, SendOutcome, SendRejection};
pub use config::SessionConfig;
pub use error::{LogLevel, PipelineError};
pub use models::{
    ChatMessage, FileCandidate, FileId, FileRecord, FileSource, FileStatus, MessageId, Preview,
    Role, SessionProgress, StatusUpdate, TrainingState,
};
pub use preview::{DecodeError, DecodedFile, FilePreviewReader};
pub use progress::{
    CompletionHook, IncrementSource, ProgressSimulator, RandomIncrements, ScriptedIncrements,
    SessionGate, StartOutcome, TrainingRun,
};
pub use responder::{CannedResponder, Responder, CANNED_REPLIES};
pub use store::{SharedRecordStore, StatusCounts, TransitionOutcome, UploadRecordStore};
pub use validator::{FileValidator, Rejection, Validated, ValidationError};
