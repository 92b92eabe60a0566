//! Ordered store of file records.
//!
//! `UploadRecordStore` is the single owner of every `FileRecord`. Decoders and
//! the ingestion pass change records only through its update operations, which
//! enforce the forward-only status lifecycle. Completions can arrive in any
//! order and for ids that were removed in the meantime; both are expected.

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{FileId, FileRecord, FileStatus, Preview, StatusUpdate};

/// Result of a status update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// The record already holds this terminal status; nothing changed.
    Unchanged,
    Rejected {
        from: FileStatus,
        to: FileStatus,
    },
    NotFound,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

/// Number of records in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending_decode: usize,
    pub uploading: usize,
    pub uploaded: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending_decode + self.uploading + self.uploaded + self.failed
    }
}

#[derive(Debug, Default)]
pub struct UploadRecordStore {
    records: IndexMap<FileId, FileRecord>,
}

impl UploadRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records after the existing ones, keeping their order.
    /// Returns how many were added; an id already present is skipped.
    pub fn add_batch(&mut self, records: impl IntoIterator<Item = FileRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if self.records.contains_key(&record.id) {
                tracing::warn!(file_id = %record.id, "Duplicate file id ignored");
                continue;
            }
            self.records.insert(record.id, record);
            added += 1;
        }
        added
    }

    pub fn update_status(&mut self, id: FileId, update: StatusUpdate) -> TransitionOutcome {
        let Some(record) = self.records.get_mut(&id) else {
            tracing::debug!(file_id = %id, "Status update for unknown file ignored");
            return TransitionOutcome::NotFound;
        };

        let to = update.status();
        if record.status == to && to.is_terminal() {
            return TransitionOutcome::Unchanged;
        }
        if !record.status.can_transition_to(to) {
            tracing::debug!(
                file_id = %id,
                from = %record.status,
                to = %to,
                "Refused backward status transition"
            );
            return TransitionOutcome::Rejected {
                from: record.status,
                to,
            };
        }

        record.status = to;
        match update {
            StatusUpdate::Uploading => {}
            StatusUpdate::Uploaded { remote_id } => record.remote_id = remote_id,
            StatusUpdate::Failed { reason } => record.failure = Some(reason),
        }

        TransitionOutcome::Applied
    }

    /// Store the decoded preview for a record. Returns false if the id is unknown.
    pub fn attach_preview(&mut self, id: FileId, preview: Preview) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.preview = Some(preview);
                true
            }
            None => false,
        }
    }

    /// Remove a record, keeping the order of the remaining ones.
    pub fn remove(&mut self, id: FileId) -> Option<FileRecord> {
        self.records.shift_remove(&id)
    }

    pub fn get(&self, id: FileId) -> Option<&FileRecord> {
        self.records.get(&id)
    }

    /// Position of a record in insertion order.
    pub fn position(&self, id: FileId) -> Option<usize> {
        self.records.get_index_of(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        self.records
            .values()
            .fold(StatusCounts::default(), |mut counts, record| {
                match record.status {
                    FileStatus::PendingDecode => counts.pending_decode += 1,
                    FileStatus::Uploading => counts.uploading += 1,
                    FileStatus::Uploaded => counts.uploaded += 1,
                    FileStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }
}

/// Record store shared between concurrent decode and upload tasks.
///
/// All mutations go through one tokio `RwLock`; readers get cloned snapshots.
#[derive(Debug, Clone, Default)]
pub struct SharedRecordStore {
    inner: Arc<RwLock<UploadRecordStore>>,
}

impl SharedRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_batch(&self, records: Vec<FileRecord>) -> usize {
        self.inner.write().await.add_batch(records)
    }

    pub async fn update_status(&self, id: FileId, update: StatusUpdate) -> TransitionOutcome {
        self.inner.write().await.update_status(id, update)
    }

    pub async fn attach_preview(&self, id: FileId, preview: Preview) -> bool {
        self.inner.write().await.attach_preview(id, preview)
    }

    pub async fn remove(&self, id: FileId) -> Option<FileRecord> {
        self.inner.write().await.remove(id)
    }

    pub async fn get(&self, id: FileId) -> Option<FileRecord> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn position(&self, id: FileId) -> Option<usize> {
        self.inner.read().await.position(id)
    }

    pub async fn snapshot(&self) -> Vec<FileRecord> {
        self.inner.read().await.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn counts(&self) -> StatusCounts {
        self.inner.read().await.counts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileCandidate;

    fn record(name: &str) -> FileRecord {
        FileRecord::from_candidate(&FileCandidate::from_bytes(
            name,
            "image/png",
            vec![1u8; 16],
        ))
    }

    fn preview() -> Preview {
        Preview {
            data_url: "data:image/png;base64,AAAA".to_string(),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn add_batch_appends_in_order() {
        let mut store = UploadRecordStore::new();
        store.add_batch(vec![record("a.png"), record("b.png")]);
        let added = store.add_batch(vec![record("c.png")]);

        assert_eq!(added, 1);
        let names: Vec<String> = store.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn add_batch_skips_duplicate_ids() {
        let mut store = UploadRecordStore::new();
        let first = record("a.png");
        let again = first.clone();
        store.add_batch(vec![first]);
        assert_eq!(store.add_batch(vec![again]), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn full_forward_lifecycle() {
        let mut store = UploadRecordStore::new();
        let rec = record("a.png");
        let id = rec.id;
        store.add_batch(vec![rec]);

        assert!(store.attach_preview(id, preview()));
        assert!(store.update_status(id, StatusUpdate::Uploading).is_applied());
        assert!(store
            .update_status(
                id,
                StatusUpdate::Uploaded {
                    remote_id: Some("srv-1".to_string())
                }
            )
            .is_applied());

        let stored = store.get(id).unwrap();
        assert_eq!(stored.status, FileStatus::Uploaded);
        assert_eq!(stored.remote_id.as_deref(), Some("srv-1"));
        assert!(stored.preview.is_some());
    }

    #[test]
    fn terminal_status_never_regresses() {
        let mut store = UploadRecordStore::new();
        let rec = record("a.png");
        let id = rec.id;
        store.add_batch(vec![rec]);
        store.update_status(id, StatusUpdate::Uploading);
        store.update_status(
            id,
            StatusUpdate::Failed {
                reason: "boom".to_string(),
            },
        );

        assert_eq!(
            store.update_status(id, StatusUpdate::Uploading),
            TransitionOutcome::Rejected {
                from: FileStatus::Failed,
                to: FileStatus::Uploading,
            }
        );
        assert!(matches!(
            store.update_status(id, StatusUpdate::Uploaded { remote_id: None }),
            TransitionOutcome::Rejected { .. }
        ));
        assert_eq!(store.get(id).unwrap().status, FileStatus::Failed);
        assert_eq!(store.get(id).unwrap().failure.as_deref(), Some("boom"));
    }

    #[test]
    fn reapplying_terminal_status_is_harmless() {
        let mut store = UploadRecordStore::new();
        let rec = record("a.png");
        let id = rec.id;
        store.add_batch(vec![rec]);
        store.update_status(id, StatusUpdate::Uploading);
        store.update_status(
            id,
            StatusUpdate::Uploaded {
                remote_id: Some("srv-1".to_string()),
            },
        );

        let again = store.update_status(
            id,
            StatusUpdate::Uploaded {
                remote_id: Some("srv-2".to_string()),
            },
        );
        assert_eq!(again, TransitionOutcome::Unchanged);
        assert_eq!(store.get(id).unwrap().remote_id.as_deref(), Some("srv-1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn pending_cannot_skip_to_uploaded() {
        let mut store = UploadRecordStore::new();
        let rec = record("a.png");
        let id = rec.id;
        store.add_batch(vec![rec]);
        assert!(!store
            .update_status(id, StatusUpdate::Uploaded { remote_id: None })
            .is_applied());
        assert_eq!(store.get(id).unwrap().status, FileStatus::PendingDecode);
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut store = UploadRecordStore::new();
        store.add_batch(vec![record("a.png")]);
        let unknown = uuid::Uuid::new_v4();

        assert!(store.remove(unknown).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.update_status(unknown, StatusUpdate::Uploading),
            TransitionOutcome::NotFound
        );
        assert!(!store.attach_preview(unknown, preview()));
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut store = UploadRecordStore::new();
        let a = record("a.png");
        let b = record("b.png");
        let c = record("c.png");
        let b_id = b.id;
        let c_id = c.id;
        store.add_batch(vec![a, b, c]);

        let removed = store.remove(b_id).unwrap();
        assert_eq!(removed.name, "b.png");
        let names: Vec<String> = store.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert_eq!(store.position(c_id), Some(1));
    }

    #[test]
    fn counts_by_status() {
        let mut store = UploadRecordStore::new();
        let a = record("a.png");
        let b = record("b.png");
        let a_id = a.id;
        store.add_batch(vec![a, b, record("c.png")]);
        store.update_status(a_id, StatusUpdate::Uploading);

        let counts = store.counts();
        assert_eq!(counts.pending_decode, 2);
        assert_eq!(counts.uploading, 1);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn shared_store_keeps_order_under_concurrent_updates() {
        let store = SharedRecordStore::new();
        let records: Vec<FileRecord> = (0..16).map(|i| record(&format!("{i}.png"))).collect();
        let ids: Vec<FileId> = records.iter().map(|r| r.id).collect();
        store.add_batch(records).await;

        let mut tasks = Vec::new();
        for id in ids.iter().rev().copied() {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.update_status(id, StatusUpdate::Uploading).await;
                store
                    .update_status(id, StatusUpdate::Uploaded { remote_id: None })
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_applied());
        }

        let snapshot = store.snapshot().await;
        let order: Vec<FileId> = snapshot.iter().map(|r| r.id).collect();
        assert_eq!(order, ids);
        assert_eq!(store.counts().await.uploaded, 16);
    }
}
