use serde::Serialize;

use imprint_core::models::FileId;
use imprint_core::Rejection;

/// What happened to the batch built from one `add_files` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Nothing left to send: every file was rejected or failed to decode.
    Skipped,
    /// No ingestion endpoint configured; decoded files were marked ready locally.
    LocalOnly { ready: usize },
    Uploaded { uploaded: usize, missing: usize },
    TransportFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeFailure {
    pub id: FileId,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Ids of the records created for accepted files, in submission order.
    pub accepted: Vec<FileId>,
    pub rejected: Vec<Rejection>,
    pub decode_failures: Vec<DecodeFailure>,
    pub outcome: BatchOutcome,
}

impl IngestReport {
    pub(crate) fn new(rejected: Vec<Rejection>) -> Self {
        Self {
            accepted: Vec::new(),
            rejected,
            decode_failures: Vec::new(),
            outcome: BatchOutcome::Skipped,
        }
    }

    /// Human-readable rejection lines, `name: reason`.
    pub fn rejection_messages(&self) -> Vec<String> {
        self.rejected.iter().map(ToString::to_string).collect()
    }
}
