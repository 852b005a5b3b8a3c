//! Request and response bodies exchanged with the backend.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::backend::BackendKind;

/// A citation backing part of an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based page number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl Source {
    /// "policy.pdf p.3", or "unknown" when the file is missing.
    pub fn label(&self) -> String {
        let file = self.file.as_deref().unwrap_or("unknown");
        match self.page {
            Some(page) => format!("{} p.{}", file, page),
            None => file.to_string(),
        }
    }
}

/// Body of `POST /chat`, and the control frame sent after the stream opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub backend: BackendKind,
}

/// Citation lists from the server. Anything but an array is no citation
/// set; array items that aren't a valid source are skipped.
pub(crate) fn sources_from_value(value: Option<Value>) -> Option<Vec<Source>> {
    match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    }
}

fn lenient_sources<'de, D>(deserializer: D) -> Result<Option<Vec<Source>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(sources_from_value(Option::<Value>::deserialize(deserializer)?))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default, deserialize_with = "lenient_sources")]
    pub sources: Option<Vec<Source>>,
    /// Echoed by the server as-is; informational only.
    #[serde(default)]
    pub backend: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestRequest {
    pub backend: BackendKind,
    pub force_reset: bool,
}

/// Kept loose so that any 2xx body still renders a status line. Counts are
/// only shown when they are numbers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub backend: Option<Value>,
    #[serde(default)]
    pub chunks_indexed: Option<Value>,
    #[serde(default)]
    pub chunks_produced: Option<Value>,
    #[serde(default)]
    pub documents_loaded: Option<Value>,
    #[serde(default)]
    pub errors: Option<Value>,
    #[serde(default)]
    pub files_indexed: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
}

impl IngestResponse {
    pub fn error_count(&self) -> usize {
        match &self.errors {
            Some(Value::Array(errors)) => errors.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub saved: Option<Vec<UploadedFile>>,
    #[serde(default)]
    pub skipped: Option<Vec<UploadedFile>>,
    #[serde(default)]
    pub dest_dir: Option<String>,
}

/// Outcome of one upload, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub saved: Vec<String>,
    pub skipped: Vec<String>,
    pub dest_dir: String,
}

impl From<UploadResponse> for UploadResult {
    fn from(resp: UploadResponse) -> Self {
        let names = |files: Option<Vec<UploadedFile>>| {
            files
                .unwrap_or_default()
                .into_iter()
                .map(|f| f.filename)
                .collect::<Vec<_>>()
        };
        Self {
            saved: names(resp.saved),
            skipped: names(resp.skipped),
            dest_dir: resp.dest_dir.unwrap_or_else(|| "server".to_string()),
        }
    }
}
