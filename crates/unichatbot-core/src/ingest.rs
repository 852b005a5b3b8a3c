//! Trigger server-side indexing and summarise the result.

use serde_json::Value;

use crate::backend::BackendKind;
use crate::error::Result;
use crate::models::{IngestRequest, IngestResponse};
use crate::transport::http::HttpTransport;

pub const INGESTING_MESSAGE: &str = "Running ingestion…";
pub const INGEST_FAILED_MESSAGE: &str = "Failed to ingest. Check server logs and configuration.";

#[derive(Clone)]
pub struct Ingestor {
    transport: HttpTransport,
}

impl Ingestor {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    pub async fn send(&self, backend: BackendKind, force_reset: bool) -> Result<IngestResponse> {
        tracing::info!("ingesting on {} (force_reset: {})", backend, force_reset);
        self.transport
            .ingest_pdfs(&IngestRequest {
                backend,
                force_reset,
            })
            .await
    }

    /// Status line for one ingest run. Never fails.
    pub async fn ingest(&self, backend: BackendKind, force_reset: bool) -> String {
        summarize(backend, self.send(backend, force_reset).await)
    }
}

/// A count as the server sent it, or `?` when it isn't a number.
fn count(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => match (n.as_u64(), n.as_f64()) {
            (Some(n), _) => n.to_string(),
            (None, Some(f)) => f.to_string(),
            (None, None) => "?".to_string(),
        },
        _ => "?".to_string(),
    }
}

pub fn summarize(requested: BackendKind, result: Result<IngestResponse>) -> String {
    match result {
        Ok(resp) => {
            let errors = resp.error_count();
            if errors > 0 {
                tracing::warn!("ingest reported {} error(s)", errors);
            }
            let backend = match resp.backend.as_ref().and_then(Value::as_str) {
                Some(name) => name.to_string(),
                None => requested.to_string(),
            };
            format!(
                "Done Ingesting. Indexed {} chunks from {} files on {} (status: {}).",
                count(resp.chunks_indexed.as_ref()),
                count(resp.files_indexed.as_ref()),
                backend,
                resp.status.as_ref().and_then(Value::as_str).unwrap_or("unknown"),
            )
        }
        Err(e) => {
            tracing::warn!("ingest failed: {}", e);
            INGEST_FAILED_MESSAGE.to_string()
        }
    }
}
