use std::path::Path;

use crate::config::SessionConfig;
use crate::models::FileCandidate;

/// Reasons a candidate file is not accepted as training data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid content type: {content_type} (only images are accepted)")]
    NotAnImage { content_type: String },

    #[error("Empty file")]
    EmptyFile,
}

/// A rejected candidate, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub reason: ValidationError,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Result of validating a batch: accepted candidates keep their input order.
#[derive(Debug, Default)]
pub struct Validated {
    pub accepted: Vec<FileCandidate>,
    pub rejected: Vec<Rejection>,
}

/// Image file validator
///
/// Accepts any `image/*` content type up to a fixed size ceiling. Rejections
/// are reported per file so a mixed batch partially succeeds.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_file_size: u64,
}

impl FileValidator {
    /// 10 MiB
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_file_size_bytes)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate that the content type names an image kind (`image/<subtype>`)
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        // Must parse the same way the multipart encoder parses it.
        let is_image = content_type
            .trim()
            .parse::<mime::Mime>()
            .map(|parsed| {
                parsed.type_().as_str().eq_ignore_ascii_case("image")
                    && !parsed.subtype().as_str().is_empty()
            })
            .unwrap_or(false);

        if is_image {
            Ok(())
        } else {
            Err(ValidationError::NotAnImage {
                content_type: content_type.to_string(),
            })
        }
    }

    pub fn check(&self, candidate: &FileCandidate) -> Result<(), ValidationError> {
        self.validate_content_type(&candidate.mime_type)?;
        self.validate_file_size(candidate.size)?;
        Ok(())
    }

    /// Split a batch into accepted candidates and per-file rejections.
    pub fn partition(&self, candidates: Vec<FileCandidate>) -> Validated {
        let mut validated = Validated::default();

        for candidate in candidates {
            match self.check(&candidate) {
                Ok(()) => validated.accepted.push(candidate),
                Err(reason) => {
                    tracing::debug!(
                        file_name = %candidate.name,
                        content_type = %candidate.mime_type,
                        size = candidate.size,
                        reason = %reason,
                        "Rejected candidate file"
                    );
                    validated.rejected.push(Rejection {
                        name: candidate.name,
                        reason,
                    });
                }
            }
        }

        validated
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_FILE_SIZE)
    }
}

/// Map common image extensions to their content type.
///
/// Hosts that hand over bare paths (no browser-provided type) use this to
/// declare a content type before validation.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();

    let content_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };

    Some(content_type)
}
