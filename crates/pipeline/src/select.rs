//! Candidate file validation for the upload workflow.

use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hard ceiling on upload size: 500 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Container MIME types the backend accepts.
pub const ACCEPTED_MIME: [&str; 4] = [
    "video/mp4",
    "video/mov",
    "video/avi",
    "video/quicktime",
];

/// A file the user picked, before validation.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub name: String,
    pub mime: String,
    pub size_bytes: u64,
}

impl FileCandidate {
    /// Build a candidate from a path on disk, sniffing the MIME type from
    /// the extension the way browsers report it.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        Ok(Self {
            mime: mime_for_path(path).to_string(),
            name,
            size_bytes: meta.len(),
            path: path.to_path_buf(),
        })
    }
}

/// A candidate that passed validation and is ready to upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub mime: String,
    pub size_bytes: u64,
}

pub(crate) fn validate(candidate: FileCandidate) -> Result<SelectedFile, PipelineError> {
    if !ACCEPTED_MIME.contains(&candidate.mime.as_str()) {
        return Err(PipelineError::UnsupportedFormat(candidate.mime));
    }
    if candidate.size_bytes > MAX_UPLOAD_BYTES {
        return Err(PipelineError::FileTooLarge {
            size: candidate.size_bytes,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(SelectedFile {
        path: candidate.path,
        name: candidate.name,
        mime: candidate.mime,
        size_bytes: candidate.size_bytes,
    })
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mov") | Some("qt") => "video/quicktime",
        Some("avi") => "video/avi",
        _ => "application/octet-stream",
    }
}
