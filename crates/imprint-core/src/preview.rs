//! Preview decoding for accepted files.
//!
//! Each file is read and decoded independently; a batch is decoded
//! concurrently and results come back in completion order. Header probing is
//! synchronous and runs on the blocking pool.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::stream::{FuturesUnordered, Stream};
use std::io::Cursor;

use crate::models::{FileCandidate, FileId, FileSource, Preview};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} is not a readable image: {message}")]
    Corrupt { name: String, message: String },

    #[error("Preview task for {name} did not complete")]
    Aborted { name: String },
}

impl DecodeError {
    pub fn file_name(&self) -> &str {
        match self {
            DecodeError::Read { name, .. }
            | DecodeError::Corrupt { name, .. }
            | DecodeError::Aborted { name } => name,
        }
    }
}

/// A decoded file: its preview plus the bytes that were read, reused for upload.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub name: String,
    pub mime_type: String,
    pub preview: Preview,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FilePreviewReader;

impl FilePreviewReader {
    pub fn new() -> Self {
        Self
    }

    /// Read one candidate and turn it into an inline preview.
    pub async fn read(&self, candidate: &FileCandidate) -> Result<DecodedFile, DecodeError> {
        let bytes = match &candidate.source {
            FileSource::Memory(bytes) => bytes.clone(),
            FileSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map(Bytes::from)
                    .map_err(|source| DecodeError::Read {
                        name: candidate.name.clone(),
                        source,
                    })?
            }
        };

        let header = bytes.clone();
        let (width, height) = tokio::task::spawn_blocking(move || header_dimensions(&header))
            .await
            .map_err(|_| DecodeError::Aborted {
                name: candidate.name.clone(),
            })?
            .map_err(|message| DecodeError::Corrupt {
                name: candidate.name.clone(),
                message,
            })?;

        let data_url = format!(
            "data:{};base64,{}",
            candidate.mime_type,
            STANDARD.encode(&bytes)
        );

        tracing::debug!(
            file_name = %candidate.name,
            width,
            height,
            bytes = bytes.len(),
            "Decoded preview"
        );

        Ok(DecodedFile {
            name: candidate.name.clone(),
            mime_type: candidate.mime_type.clone(),
            preview: Preview {
                data_url,
                width,
                height,
            },
            bytes,
        })
    }

    /// Decode every job concurrently, yielding `(id, result)` as each finishes.
    pub fn read_all(
        &self,
        jobs: Vec<(FileId, FileCandidate)>,
    ) -> impl Stream<Item = (FileId, Result<DecodedFile, DecodeError>)> + '_ {
        jobs.into_iter()
            .map(|(id, candidate)| async move { (id, self.read(&candidate).await) })
            .collect::<FuturesUnordered<_>>()
    }
}

/// Read image dimensions from the header without decoding pixel data.
fn header_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}
