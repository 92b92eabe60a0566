use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

pub type FileId = Uuid;

/// Lifecycle status of a tracked file.
///
/// Statuses only move forward: `PendingDecode -> Uploading -> Uploaded | Failed`,
/// with `PendingDecode -> Failed` for files whose preview could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    PendingDecode,
    Uploading,
    Uploaded,
    Failed,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Uploaded | FileStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the forward-only lifecycle.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        use FileStatus::*;
        matches!(
            (self, next),
            (PendingDecode, Uploading)
                | (PendingDecode, Failed)
                | (Uploading, Uploaded)
                | (Uploading, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::PendingDecode => "pending_decode",
            FileStatus::Uploading => "uploading",
            FileStatus::Uploaded => "uploaded",
            FileStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested status change, carrying the data that goes with the target status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Uploading,
    /// `remote_id` is `None` when the session runs without an ingestion endpoint.
    Uploaded {
        remote_id: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl StatusUpdate {
    pub fn status(&self) -> FileStatus {
        match self {
            StatusUpdate::Uploading => FileStatus::Uploading,
            StatusUpdate::Uploaded { .. } => FileStatus::Uploaded,
            StatusUpdate::Failed { .. } => FileStatus::Failed,
        }
    }
}

/// Where the bytes of a candidate file live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Bytes),
    Path(PathBuf),
}

/// Raw file as handed over by a file picker or drop target, before validation.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub mime_type: String,
    /// Size as declared by the host (file metadata), used for validation before any read.
    pub size: u64,
    pub source: FileSource,
}

impl FileCandidate {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    pub fn from_path(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            source: FileSource::Path(path.into()),
        }
    }
}

/// Inline displayable rendition of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// Tracked state of one accepted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub declared_size: u64,
    pub mime_type: String,
    pub preview: Option<Preview>,
    pub status: FileStatus,
    pub remote_id: Option<String>,
    pub failure: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl FileRecord {
    /// New record in `PendingDecode` with a freshly generated id.
    pub fn from_candidate(candidate: &FileCandidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: candidate.name.clone(),
            declared_size: candidate.size,
            mime_type: candidate.mime_type.clone(),
            preview: None,
            status: FileStatus::PendingDecode,
            remote_id: None,
            failure: None,
            added_at: Utc::now(),
        }
    }

    /// Size in kilobytes with two decimals, e.g. `"2.00 KB"`.
    pub fn display_size(&self) -> String {
        format!("{:.2} KB", self.declared_size as f64 / 1024.0)
    }
}
