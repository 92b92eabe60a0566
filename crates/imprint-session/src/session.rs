use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

use imprint_api_client::{BatchItem, FileOutcome, IngestBatch, IngestionClient, IngestionEndpoint};
use imprint_core::models::{ChatMessage, FileCandidate, FileId, FileRecord, MessageId, StatusUpdate};
use imprint_core::progress::CompletionHook;
use imprint_core::{
    CannedResponder, ChatLog, FilePreviewReader, FileValidator, IncrementSource, PipelineError,
    ProgressSimulator, RandomIncrements, Responder, SendOutcome, SessionConfig, SessionGate,
    SessionProgress, SharedRecordStore, StartOutcome, StatusCounts, Validated,
};

use crate::report::{BatchOutcome, DecodeFailure, IngestReport};

pub const TRAINING_COMPLETE_MESSAGE: &str =
    "Training complete! You can now start chatting with your model.";
pub const MISSING_FROM_RESPONSE: &str = "missing from ingestion response";

/// One user session: the record store, the training run and the chat log.
pub struct Session {
    config: SessionConfig,
    validator: FileValidator,
    reader: FilePreviewReader,
    store: SharedRecordStore,
    ingestion: Option<Arc<dyn IngestionEndpoint>>,
    progress: ProgressSimulator,
    chat: ChatLog,
}

pub struct SessionBuilder {
    config: SessionConfig,
    ingestion: Option<Arc<dyn IngestionEndpoint>>,
    responder: Arc<dyn Responder>,
    increments: Option<Box<dyn IncrementSource>>,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ingestion: None,
            responder: Arc::new(CannedResponder),
            increments: None,
        }
    }

    pub fn ingestion(mut self, endpoint: Arc<dyn IngestionEndpoint>) -> Self {
        self.ingestion = Some(endpoint);
        self
    }

    pub fn responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = responder;
        self
    }

    pub fn increments(mut self, source: Box<dyn IncrementSource>) -> Self {
        self.increments = Some(source);
        self
    }

    pub fn build(self) -> Session {
        let source = self
            .increments
            .unwrap_or_else(|| Box::new(RandomIncrements::new()));
        let progress = ProgressSimulator::from_config(&self.config, source);
        let chat = ChatLog::from_config(&self.config, progress.gate(), self.responder);

        Session {
            validator: FileValidator::from_config(&self.config),
            reader: FilePreviewReader::new(),
            store: SharedRecordStore::new(),
            ingestion: self.ingestion,
            progress,
            chat,
            config: self.config,
        }
    }
}

impl Session {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Build a session with the HTTP ingestion client when an API URL is configured.
    pub fn from_config(config: SessionConfig) -> anyhow::Result<Self> {
        let mut builder = SessionBuilder::new(config.clone());
        if let Some(client) = IngestionClient::from_config(&config)? {
            tracing::info!(url = %client.endpoint_url(), "Ingestion endpoint configured");
            builder = builder.ingestion(Arc::new(client));
        } else {
            tracing::info!("No ingestion endpoint configured, running in preview-only mode");
        }
        Ok(builder.build())
    }

    /// Validate, decode and ingest a batch of candidate files.
    ///
    /// Rejected files never become records. Accepted files are decoded
    /// concurrently; files that decode are submitted together in store order
    /// once every decode has settled.
    pub async fn add_files(&self, candidates: Vec<FileCandidate>) -> IngestReport {
        let Validated { accepted, rejected } = self.validator.partition(candidates);
        for rejection in &rejected {
            PipelineError::from(rejection.clone()).log();
        }

        let mut report = IngestReport::new(rejected);
        if accepted.is_empty() {
            PipelineError::EmptyInput.log();
            return report;
        }

        let records: Vec<FileRecord> = accepted.iter().map(FileRecord::from_candidate).collect();
        report.accepted = records.iter().map(|record| record.id).collect();
        let jobs: Vec<(FileId, FileCandidate)> =
            report.accepted.iter().copied().zip(accepted).collect();

        let added = self.store.add_batch(records).await;
        tracing::info!(batch_size = added, "Accepted files");

        let decoded = self.decode_batch(jobs, &mut report).await;
        if decoded.is_empty() {
            return report;
        }

        report.outcome = match &self.ingestion {
            Some(endpoint) => self.upload(endpoint.as_ref(), decoded).await,
            None => self.mark_local(decoded).await,
        };
        report
    }

    /// Decode every job, attaching previews as they complete. Returns the
    /// files now in `Uploading`, sorted into store order.
    async fn decode_batch(
        &self,
        jobs: Vec<(FileId, FileCandidate)>,
        report: &mut IngestReport,
    ) -> Vec<BatchItem> {
        let mut ready = Vec::new();
        let results = self.reader.read_all(jobs);
        tokio::pin!(results);

        while let Some((id, result)) = results.next().await {
            match result {
                Ok(file) => {
                    if !self.store.attach_preview(id, file.preview).await {
                        tracing::debug!(file_id = %id, "Record removed before preview arrived");
                        continue;
                    }
                    if self
                        .store
                        .update_status(id, StatusUpdate::Uploading)
                        .await
                        .is_applied()
                    {
                        ready.push(BatchItem {
                            id,
                            name: file.name,
                            mime_type: file.mime_type,
                            bytes: file.bytes,
                        });
                    }
                }
                Err(err) => {
                    let failure = DecodeFailure {
                        id,
                        name: err.file_name().to_string(),
                        reason: err.to_string(),
                    };
                    PipelineError::from(err).log();
                    self.store
                        .update_status(
                            id,
                            StatusUpdate::Failed {
                                reason: failure.reason.clone(),
                            },
                        )
                        .await;
                    report.decode_failures.push(failure);
                }
            }
        }

        let mut ordered = Vec::with_capacity(ready.len());
        for item in ready {
            if let Some(position) = self.store.position(item.id).await {
                ordered.push((position, item));
            }
        }
        ordered.sort_by_key(|(position, _)| *position);
        ordered.into_iter().map(|(_, item)| item).collect()
    }

    async fn upload(
        &self,
        endpoint: &dyn IngestionEndpoint,
        items: Vec<BatchItem>,
    ) -> BatchOutcome {
        let batch = IngestBatch::new(items);
        let ids = batch.ids();

        match endpoint.submit(batch).await {
            Ok(receipt) => {
                for (id, outcome) in receipt.outcomes.iter() {
                    let update = match outcome {
                        FileOutcome::Uploaded { remote_id } => StatusUpdate::Uploaded {
                            remote_id: Some(remote_id.clone()),
                        },
                        FileOutcome::Missing => StatusUpdate::Failed {
                            reason: MISSING_FROM_RESPONSE.to_string(),
                        },
                    };
                    self.store.update_status(*id, update).await;
                }

                let uploaded = receipt.uploaded_count();
                let missing = receipt.missing_count();
                let mut summary = format!("Uploaded {} file(s) for training.", uploaded);
                if missing > 0 {
                    summary.push_str(&format!(
                        " {} file(s) were missing from the server response.",
                        missing
                    ));
                }
                self.chat.append_system(summary).await;

                BatchOutcome::Uploaded { uploaded, missing }
            }
            Err(err) => {
                let error = PipelineError::TransportFailed(err.to_string());
                error.log();
                for id in ids {
                    self.store
                        .update_status(
                            id,
                            StatusUpdate::Failed {
                                reason: error.to_string(),
                            },
                        )
                        .await;
                }
                self.chat.append_system(error.to_string()).await;

                BatchOutcome::TransportFailed {
                    message: err.to_string(),
                }
            }
        }
    }

    async fn mark_local(&self, items: Vec<BatchItem>) -> BatchOutcome {
        let mut ready = 0;
        for item in items {
            if self
                .store
                .update_status(item.id, StatusUpdate::Uploaded { remote_id: None })
                .await
                .is_applied()
            {
                ready += 1;
            }
        }

        self.chat
            .append_system(format!("{} file(s) ready for training.", ready))
            .await;
        BatchOutcome::LocalOnly { ready }
    }

    /// Remove a record. In-flight work for it keeps running; its results are dropped.
    pub async fn remove_file(&self, id: FileId) -> Option<FileRecord> {
        let removed = self.store.remove(id).await;
        if removed.is_some() {
            tracing::info!(file_id = %id, "File removed");
        }
        removed
    }

    /// Start the training run over every record that has not failed.
    pub async fn start_training(&self) -> StartOutcome {
        let counts = self.store.counts().await;
        let accepted_files = counts.total() - counts.failed;

        let chat = self.chat.clone();
        let on_complete: CompletionHook = Box::new(move |_: SessionProgress| {
            async move {
                chat.append_system(TRAINING_COMPLETE_MESSAGE).await;
            }
            .boxed()
        });

        self.progress.start_with(accepted_files, Some(on_complete))
    }

    pub async fn send(&self, text: impl Into<String>) -> SendOutcome {
        self.chat.append_user(text).await
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_uploading_enabled(&self) -> bool {
        self.ingestion.is_some()
    }

    pub fn progress(&self) -> SessionProgress {
        self.progress.snapshot()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<SessionProgress> {
        self.progress.subscribe()
    }

    pub fn gate(&self) -> SessionGate {
        self.progress.gate()
    }

    pub async fn records(&self) -> Vec<FileRecord> {
        self.store.snapshot().await
    }

    pub async fn record(&self, id: FileId) -> Option<FileRecord> {
        self.store.get(id).await
    }

    pub async fn counts(&self) -> StatusCounts {
        self.store.counts().await
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.chat.messages().await
    }

    pub async fn message(&self, id: MessageId) -> Option<ChatMessage> {
        self.chat.message(id).await
    }

    pub fn is_typing(&self) -> bool {
        self.chat.is_typing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imprint_core::models::{FileStatus, Role};
    use imprint_core::ScriptedIncrements;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn preview_only() -> Session {
        Session::builder(SessionConfig::default())
            .increments(Box::new(ScriptedIncrements::new(vec![20; 5])))
            .build()
    }

    #[tokio::test]
    async fn preview_only_marks_files_ready_without_remote_id() {
        let session = preview_only();
        let report = session
            .add_files(vec![FileCandidate::from_bytes("cat.png", "image/png", png(4, 3))])
            .await;

        assert_eq!(report.outcome, BatchOutcome::LocalOnly { ready: 1 });
        let record = session.record(report.accepted[0]).await.unwrap();
        assert_eq!(record.status, FileStatus::Uploaded);
        assert!(record.remote_id.is_none());
        let preview = record.preview.unwrap();
        assert_eq!((preview.width, preview.height), (4, 3));
        assert!(preview.data_url.starts_with("data:image/png;base64,"));

        let messages = session.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn corrupt_file_fails_alone() {
        let session = preview_only();
        let report = session
            .add_files(vec![
                FileCandidate::from_bytes("good.png", "image/png", png(2, 2)),
                FileCandidate::from_bytes("bad.png", "image/png", b"garbage".to_vec()),
            ])
            .await;

        assert_eq!(report.decode_failures.len(), 1);
        assert_eq!(report.decode_failures[0].name, "bad.png");
        assert_eq!(report.outcome, BatchOutcome::LocalOnly { ready: 1 });

        let counts = session.counts().await;
        assert_eq!(counts.uploaded, 1);
        assert_eq!(counts.failed, 1);

        let names: Vec<String> = session.records().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["good.png", "bad.png"]);
    }

    #[tokio::test]
    async fn rejected_only_batch_is_silent() {
        let session = preview_only();
        let report = session
            .add_files(vec![FileCandidate::from_bytes(
                "notes.txt",
                "text/plain",
                b"hello".to_vec(),
            )])
            .await;

        assert_eq!(report.outcome, BatchOutcome::Skipped);
        assert_eq!(report.rejection_messages().len(), 1);
        assert!(report.rejection_messages()[0].starts_with("notes.txt:"));
        assert!(session.records().await.is_empty());
        assert!(session.messages().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn training_needs_a_surviving_file() {
        let session = preview_only();
        assert!(matches!(
            session.start_training().await,
            StartOutcome::NothingToTrain
        ));

        session
            .add_files(vec![FileCandidate::from_bytes(
                "bad.png",
                "image/png",
                b"garbage".to_vec(),
            )])
            .await;
        assert!(matches!(
            session.start_training().await,
            StartOutcome::NothingToTrain
        ));
        assert!(!session.progress().is_running);
    }

    #[tokio::test]
    async fn remove_file_is_idempotent() {
        let session = preview_only();
        let report = session
            .add_files(vec![FileCandidate::from_bytes("a.png", "image/png", png(1, 1))])
            .await;
        let id = report.accepted[0];

        assert!(session.remove_file(id).await.is_some());
        assert!(session.remove_file(id).await.is_none());
        assert!(session.records().await.is_empty());
    }
}
