//! Batch ingestion over multipart HTTP.
//!
//! A batch is sent as one multipart request. Every file appears twice: once
//! under the shared `files` field and once under its own `file_{index}` field.
//! The endpoint answers with a JSON object mapping original file names to
//! remote ids, either at the top level or wrapped as `{"files": {...}}`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use imprint_core::models::FileId;
use imprint_core::SessionConfig;

use crate::ApiClient;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ingestion endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid ingestion response: {0}")]
    InvalidResponse(String),

    #[error("invalid multipart part for {name}: {message}")]
    InvalidPart { name: String, message: String },
}

/// One decoded file ready to be sent.
#[derive(Clone)]
pub struct BatchItem {
    pub id: FileId,
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl fmt::Debug for BatchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchItem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Files submitted together in a single request, in submission order.
///
/// Not `Clone`: submitting consumes the batch, so it cannot be sent twice.
#[derive(Debug, Default)]
pub struct IngestBatch {
    items: Vec<BatchItem>,
}

impl IngestBatch {
    pub fn new(items: Vec<BatchItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<FileId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }
}

/// Per-file result of a successful batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded { remote_id: String },
    /// The request succeeded but the response did not name this file.
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    pub outcomes: Vec<(FileId, FileOutcome)>,
}

impl BatchReceipt {
    pub fn uploaded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FileOutcome::Uploaded { .. }))
            .count()
    }

    pub fn missing_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == FileOutcome::Missing)
            .count()
    }

    pub fn outcome(&self, id: FileId) -> Option<&FileOutcome> {
        self.outcomes
            .iter()
            .find(|(file_id, _)| *file_id == id)
            .map(|(_, outcome)| outcome)
    }
}

/// Somewhere a batch can be submitted.
#[async_trait]
pub trait IngestionEndpoint: Send + Sync {
    /// Submit the batch. An empty batch is never sent and yields an empty receipt.
    async fn submit(&self, batch: IngestBatch) -> Result<BatchReceipt, TransportError>;
}

/// Ingestion endpoint backed by [`ApiClient`].
#[derive(Clone, Debug)]
pub struct IngestionClient {
    api: ApiClient,
    path: String,
}

impl IngestionClient {
    pub fn new(api: ApiClient, path: impl Into<String>) -> Self {
        Self {
            api,
            path: path.into(),
        }
    }

    /// Returns `None` in preview-only mode (no API URL configured).
    pub fn from_config(config: &SessionConfig) -> anyhow::Result<Option<Self>> {
        Ok(ApiClient::from_config(config)?
            .map(|api| Self::new(api, config.ingest_path.clone())))
    }

    pub fn endpoint_url(&self) -> String {
        self.api.build_url(&self.path)
    }
}

#[async_trait]
impl IngestionEndpoint for IngestionClient {
    async fn submit(&self, batch: IngestBatch) -> Result<BatchReceipt, TransportError> {
        if batch.is_empty() {
            return Ok(BatchReceipt::default());
        }

        let form = build_form(&batch)?;
        tracing::info!(
            files = batch.len(),
            url = %self.endpoint_url(),
            "Submitting ingestion batch"
        );

        let body: Value = self.api.post_multipart(&self.path, form).await?;
        let mapping = parse_mapping(&body)?;
        let receipt = reconcile(&batch, &mapping);

        tracing::info!(
            uploaded = receipt.uploaded_count(),
            missing = receipt.missing_count(),
            "Ingestion batch reconciled"
        );
        Ok(receipt)
    }
}

fn file_part(item: &BatchItem) -> Result<Part, TransportError> {
    Part::bytes(item.bytes.to_vec())
        .file_name(item.name.clone())
        .mime_str(item.mime_type.trim())
        .map_err(|e| TransportError::InvalidPart {
            name: item.name.clone(),
            message: e.to_string(),
        })
}

pub(crate) fn build_form(batch: &IngestBatch) -> Result<Form, TransportError> {
    let mut form = Form::new();

    for item in batch.items() {
        form = form.part("files", file_part(item)?);
    }
    for (index, item) in batch.items().iter().enumerate() {
        form = form.part(format!("file_{}", index), file_part(item)?);
    }

    Ok(form
        .text("totalFiles", batch.len().to_string())
        .text(
            "timestamp",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        ))
}

/// Extract the name to remote id mapping. Ids may be strings or numbers;
/// entries with any other value are ignored.
pub(crate) fn parse_mapping(body: &Value) -> Result<HashMap<String, String>, TransportError> {
    let object = match body.get("files") {
        Some(Value::Object(files)) => files,
        _ => body.as_object().ok_or_else(|| {
            TransportError::InvalidResponse("expected a JSON object".to_string())
        })?,
    };

    Ok(object
        .iter()
        .filter_map(|(name, id)| {
            let id = match id {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((name.clone(), id))
        })
        .collect())
}

pub(crate) fn reconcile(batch: &IngestBatch, mapping: &HashMap<String, String>) -> BatchReceipt {
    let outcomes = batch
        .items()
        .iter()
        .map(|item| {
            let outcome = match mapping.get(&item.name) {
                Some(remote_id) => FileOutcome::Uploaded {
                    remote_id: remote_id.clone(),
                },
                None => {
                    tracing::warn!(file = %item.name, "File missing from ingestion response");
                    FileOutcome::Missing
                }
            };
            (item.id, outcome)
        })
        .collect();

    BatchReceipt { outcomes }
}
