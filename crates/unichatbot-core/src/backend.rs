use serde::{Deserialize, Serialize};
use std::fmt;

/// Which server-side vector index a request targets.
///
/// Threaded through every chat and ingest request; client-side logic never
/// branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Chroma,
    #[default]
    Weaviate,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Chroma => "chroma",
            BackendKind::Weaviate => "weaviate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "chroma" => Some(BackendKind::Chroma),
            "weaviate" => Some(BackendKind::Weaviate),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Chroma => "Chroma (local)",
            BackendKind::Weaviate => "Weaviate (remote)",
        }
    }

    /// The other variant, for a two-way toggle in the UI.
    pub fn next(&self) -> Self {
        match self {
            BackendKind::Chroma => BackendKind::Weaviate,
            BackendKind::Weaviate => BackendKind::Chroma,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
