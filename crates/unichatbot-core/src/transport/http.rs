use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use url::Url;

use super::{ChatTransport, FrameStream, WsFrameStream};
use crate::config::Endpoints;
use crate::error::{ChatError, Result};
use crate::models::{
    ChatRequest, ChatResponse, IngestRequest, IngestResponse, UploadResponse, UploadResult,
};

/// A named PDF ready to be sent as one multipart part.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// REST client plus stream connector for one backend base address.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoints: Endpoints,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            endpoints: Endpoints::new(base_url)?,
        })
    }

    pub async fn ingest_pdfs(&self, request: &IngestRequest) -> Result<IngestResponse> {
        let response = self
            .client
            .post(self.endpoints.ingest())
            .json(request)
            .send()
            .await?;

        let response = ensure_success(response, "ingest")?;
        Ok(response.json().await?)
    }

    pub async fn upload_pdfs(&self, files: Vec<UploadPart>) -> Result<UploadResult> {
        if files.is_empty() {
            return Err(ChatError::Validation("no files to upload".to_string()));
        }

        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes)
                .file_name(file.filename)
                .mime_str("application/pdf")?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(self.endpoints.upload())
            .multipart(form)
            .send()
            .await?;

        let response = ensure_success(response, "upload")?;
        let body: UploadResponse = response.json().await?;
        Ok(body.into())
    }
}

/// Non-success responses are failures; their bodies are never read.
fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        tracing::warn!("{} request failed with status {}", what, status);
        return Err(ChatError::Transport(format!("HTTP {}", status.as_u16())));
    }
    Ok(response)
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn stream_endpoint(&self) -> Result<Url> {
        self.endpoints.stream()
    }

    async fn open_stream(&self, endpoint: &Url) -> Result<Box<dyn FrameStream>> {
        tracing::debug!("opening chat stream {}", endpoint);
        let (ws, _) = tokio_tungstenite::connect_async(endpoint.as_str()).await?;
        Ok(Box::new(WsFrameStream::new(ws)))
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(self.endpoints.chat())
            .json(request)
            .send()
            .await?;

        let response = ensure_success(response, "chat")?;
        Ok(response.json().await?)
    }
}
