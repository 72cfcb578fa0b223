//! Local file attachment preview. Only metadata is read on attach; the
//! contents are encoded as a data URL on demand and never uploaded.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};

/// Files larger than this are refused
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    File,
}

#[derive(Debug, Clone)]
pub struct AttachmentPreview {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: &'static str,
    pub kind: AttachmentKind,
    pub size: u64,
}

/// Best-effort MIME type from the file extension
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

impl AttachmentPreview {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Error reading file {}", path.display()))?;
        if !metadata.is_file() {
            bail!("{} is not a file", path.display());
        }
        if metadata.len() > MAX_ATTACHMENT_BYTES {
            bail!(
                "{} is too large ({} bytes, limit {})",
                path.display(),
                metadata.len(),
                MAX_ATTACHMENT_BYTES
            );
        }

        let mime_type = mime_for(path);
        let kind = if mime_type.starts_with("image/") {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        };

        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            mime_type,
            kind,
            size: metadata.len(),
        })
    }

    /// Read the file now and encode it as a `data:` URL
    pub async fn data_url(&self) -> Result<String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Error reading file {}", self.path.display()))?;
        Ok(format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&bytes)))
    }

    /// One-line description for the status bar
    pub fn summary(&self) -> String {
        let label = match self.kind {
            AttachmentKind::Image => "image",
            AttachmentKind::File => "file",
        };
        format!("📎 {} ({label}, {})", self.file_name, human_size(self.size))
    }
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < KB * KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{:.1} MB", bytes / (KB * KB))
    }
}
