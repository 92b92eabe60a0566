use anyhow::Context;
use std::path::{Path, PathBuf};

use imprint_core::models::{FileCandidate, FileRecord};
use imprint_core::validator::content_type_for_path;

/// Content type declared for paths whose extension is not a known image type.
/// The validator rejects it.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Turn a path into a candidate, declaring size from file metadata and the
/// content type from the extension. Contents are read later, during decode.
pub async fn candidate_from_path(path: &Path) -> anyhow::Result<FileCandidate> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a file", path.display());
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = content_type_for_path(path).unwrap_or(UNKNOWN_CONTENT_TYPE);

    Ok(FileCandidate::from_path(
        name,
        mime_type,
        metadata.len(),
        path,
    ))
}

pub async fn load_candidates(paths: &[PathBuf]) -> anyhow::Result<Vec<FileCandidate>> {
    let mut candidates = Vec::with_capacity(paths.len());
    for path in paths {
        candidates.push(candidate_from_path(path).await?);
    }
    Ok(candidates)
}

/// One line per record for the `/files` listing.
pub fn format_record_line(record: &FileRecord) -> String {
    let mut line = format!(
        "{}  {:<32}  {:>12}  {}",
        record.id,
        truncate_string(&record.name, 32),
        record.display_size(),
        record.status
    );
    if let Some(remote_id) = &record.remote_id {
        line.push_str(&format!("  remote={}", remote_id));
    }
    if let Some(failure) = &record.failure {
        line.push_str(&format!("  ({})", failure));
    }
    line
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
