//! I/O adapters for the backend: REST requests and the streaming chat
//! channel. No business logic lives here.

pub mod frame;
pub mod http;
pub mod stream;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::models::{ChatRequest, ChatResponse};

pub use frame::Frame;
pub use http::HttpTransport;
pub use stream::WsFrameStream;

/// One open streaming connection. Frames arrive in order.
#[async_trait]
pub trait FrameStream: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// The next inbound text frame, or `None` once the connection has closed.
    async fn next_frame(&mut self) -> Option<Result<String>>;

    /// Close from the client side. Safe to call more than once.
    async fn close(&mut self);
}

/// What the chat session needs from the network.
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    /// Build the stream endpoint. Fails when the channel cannot be
    /// constructed at all, before any connection attempt.
    fn stream_endpoint(&self) -> Result<Url>;

    async fn open_stream(&self, endpoint: &Url) -> Result<Box<dyn FrameStream>>;

    async fn post_chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
