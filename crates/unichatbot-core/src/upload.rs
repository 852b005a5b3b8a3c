//! PDF upload: local file selection and the status line for one upload.

use std::path::{Path, PathBuf};

use crate::error::{ChatError, Result};
use crate::models::UploadResult;
use crate::transport::http::{HttpTransport, UploadPart};

pub const NO_FILES_MESSAGE: &str = "Please choose one or more PDF files to upload.";
pub const UPLOADING_MESSAGE: &str = "Uploading PDFs…";
pub const UPLOAD_FAILED_MESSAGE: &str =
    "Failed to upload. Ensure the server is reachable and accepts multipart/form-data.";

/// Files picked for the next upload, in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct FileSelection {
    files: Vec<PathBuf>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only `.pdf` files are accepted; adding one twice is a no-op.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(ChatError::Validation(format!(
                "{} is not a PDF",
                path.display()
            )));
        }
        if !self.files.contains(&path) {
            self.files.push(path);
        }
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Option<PathBuf> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    /// Drop every path in `sent`, keeping anything added since.
    pub fn remove_sent(&mut self, sent: &[PathBuf]) {
        self.files.retain(|path| !sent.contains(path));
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn count_label(&self) -> String {
        match self.files.len() {
            0 => "No files selected".to_string(),
            1 => "1 file".to_string(),
            n => format!("{} files", n),
        }
    }
}

/// What the user sees after an upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub status: String,
    pub result: Option<UploadResult>,
}

impl UploadReport {
    pub fn from_result(result: Result<UploadResult>) -> Self {
        match result {
            Ok(result) => Self {
                status: format!(
                    "Uploaded: {}, Skipped: {}. Saved under {}.",
                    result.saved.len(),
                    result.skipped.len(),
                    result.dest_dir
                ),
                result: Some(result),
            },
            Err(ChatError::Validation(_)) => Self {
                status: NO_FILES_MESSAGE.to_string(),
                result: None,
            },
            Err(e) => {
                tracing::warn!("upload failed: {}", e);
                Self {
                    status: UPLOAD_FAILED_MESSAGE.to_string(),
                    result: None,
                }
            }
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }
}

#[derive(Clone)]
pub struct Uploader {
    transport: HttpTransport,
}

impl Uploader {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// Read each file and post them as one multipart request. An empty list
    /// is rejected before anything touches the network.
    pub async fn send(&self, paths: &[PathBuf]) -> Result<UploadResult> {
        if paths.is_empty() {
            return Err(ChatError::Validation(NO_FILES_MESSAGE.to_string()));
        }

        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            parts.push(read_part(path).await?);
        }

        tracing::info!("uploading {} file(s)", parts.len());
        self.transport.upload_pdfs(parts).await
    }

    /// Upload the selection, clearing it only on success.
    pub async fn upload(&self, selection: &mut FileSelection) -> UploadReport {
        let report = UploadReport::from_result(self.send(selection.paths()).await);
        if report.succeeded() {
            selection.clear();
        }
        report
    }
}

async fn read_part(path: &Path) -> Result<UploadPart> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ChatError::Transport(format!("reading {}: {}", path.display(), e)))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.pdf".to_string());
    Ok(UploadPart { filename, bytes })
}
