//! Imprint session orchestration.
//!
//! Wires the validator, preview reader, record store, ingestion endpoint,
//! training simulator and chat log into a single `Session`.

pub mod report;
pub mod session;

pub use report::{BatchOutcome, DecodeFailure, IngestReport};
pub use session::{Session, SessionBuilder, MISSING_FROM_RESPONSE, TRAINING_COMPLETE_MESSAGE};
