use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::backend::BackendKind;
use crate::error::ChatError;

pub const DEFAULT_BACKEND_HTTP: &str = "https://unichatbot.onrender.com";
pub const BACKEND_HTTP_ENV: &str = "UNICHATBOT_BACKEND_HTTP";
const STREAM_PATH: &str = "/ws/chat";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub backend_http: Option<String>,
    pub default_backend: Option<String>,
    pub force_reset: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Record the selector in the file at `config_path`, keeping its other
    /// settings.
    pub fn save_default_backend(config_path: &Path, backend: BackendKind) -> Result<()> {
        let mut config = Self::load_from(config_path).unwrap_or_else(|_| Self::new());
        config.default_backend = Some(backend.as_str().to_string());
        config.save_to(config_path)
    }

    /// Flag, then environment, then config file, then the hosted default.
    pub fn resolve_backend_http(&self, flag: Option<&str>) -> String {
        let env = std::env::var(BACKEND_HTTP_ENV).ok();
        let raw = flag
            .map(str::to_string)
            .or(env)
            .or_else(|| self.backend_http.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_HTTP.to_string());
        raw.trim().trim_end_matches('/').to_string()
    }

    pub fn backend(&self) -> BackendKind {
        self.default_backend
            .as_deref()
            .and_then(BackendKind::parse)
            .unwrap_or_default()
    }

    pub fn force_reset(&self) -> bool {
        self.force_reset.unwrap_or(true)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("unichatbot"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

/// Absolute URLs for every backend endpoint, derived from one base address.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self, ChatError> {
        let base = Url::parse(base.trim_end_matches('/'))
            .map_err(|e| ChatError::Validation(format!("invalid backend address {base}: {e}")))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn chat(&self) -> String {
        format!("{}/chat", self.base())
    }

    pub fn ingest(&self) -> String {
        format!("{}/ingest-pdfs", self.base())
    }

    pub fn upload(&self) -> String {
        format!("{}/upload-pdfs", self.base())
    }

    /// `http` becomes `ws`, `https` becomes `wss`. Any other scheme has no
    /// streaming counterpart.
    pub fn stream(&self) -> Result<Url, ChatError> {
        let scheme = match self.base.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(ChatError::Connection(format!(
                    "no streaming endpoint for scheme {other}"
                )))
            }
        };
        let rest = &self.base()[self.base.scheme().len()..];
        Url::parse(&format!("{scheme}{rest}{STREAM_PATH}"))
            .map_err(|e| ChatError::Connection(e.to_string()))
    }
}
