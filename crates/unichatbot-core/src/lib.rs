pub mod backend;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod session;
pub mod state;
pub mod transport;
pub mod upload;

// Re-export main types for convenience
pub use backend::BackendKind;
pub use config::{Config, Endpoints};
pub use error::ChatError;
pub use ingest::Ingestor;
pub use models::{ChatRequest, ChatResponse, IngestResponse, Source, UploadResult};
pub use session::{ChatSession, SessionEvent, SessionEvents, FALLBACK_ANSWER};
pub use state::{ChatMessage, ChatRole, MessageLog, SessionStatus};
pub use transport::{ChatTransport, Frame, FrameStream, HttpTransport};
pub use upload::{FileSelection, UploadReport, Uploader};
