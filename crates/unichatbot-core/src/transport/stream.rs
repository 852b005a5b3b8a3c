use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

use super::FrameStream;
use crate::error::Result;

/// A WebSocket connection that yields text frames only.
///
/// Binary, ping and pong frames are skipped; a close frame ends the stream.
pub struct WsFrameStream<S> {
    inner: WebSocketStream<S>,
    closed: bool,
}

impl<S> WsFrameStream<S> {
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self {
            inner,
            closed: false,
        }
    }
}

#[async_trait]
impl<S> FrameStream for WsFrameStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.inner.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<String>> {
        if self.closed {
            return None;
        }
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Close(_))) | None => {
                    self.closed = true;
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    self.closed = true;
                    return None;
                }
                Some(Err(e)) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.inner.close(None).await {
            tracing::debug!("closing chat stream: {}", e);
        }
    }
}
