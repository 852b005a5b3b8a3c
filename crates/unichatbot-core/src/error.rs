//! Error taxonomy for talking to the backend.
//!
//! None of these reach the presentation layer as faults. The session,
//! upload and ingest orchestrators turn them into fixed status text.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The streaming channel could not be established or dropped.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-success status code or a network failure on a REST request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server sent an explicit error frame on the stream.
    #[error("Application error: {0}")]
    Application(String),

    /// Input rejected before any network round-trip.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request was superseded by a newer one.
    #[error("Request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Parse(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChatError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Parse(err.to_string())
    }
}
