//! Chat session controller.
//!
//! One [`ChatSession`] owns the message log, citation set and status for a
//! conversation. Network work runs in spawned tasks that report back as
//! [`SessionEvent`]s; [`ChatSession::apply`] is the only place state
//! changes. Each event names the stream or REST request that produced it,
//! and events from anything no longer active are dropped. That is how a
//! superseded request or a closed stream is kept from touching the log.
//!
//! An exchange prefers the streaming channel and falls back to `POST /chat`
//! when the channel can't be built, fails at the transport level, or the
//! server sends an `error` frame.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backend::BackendKind;
use crate::error::{ChatError, Result};
use crate::models::{ChatRequest, ChatResponse, Source};
use crate::state::{MessageLog, SessionStatus};
use crate::transport::{ChatTransport, Frame};

/// Shown in place of an answer when the REST request fails.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't get a response right now.";

#[derive(Debug)]
pub enum SessionEvent {
    StreamOpened { stream: u64 },
    StreamFrame { stream: u64, frame: Frame },
    /// Transport-level failure: connect, send or receive.
    StreamFailed { stream: u64, error: ChatError },
    /// The server closed the connection.
    StreamClosed { stream: u64 },
    RestCompleted {
        request: u64,
        result: Result<ChatResponse>,
    },
}

pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

struct ActiveStream {
    id: u64,
    question: String,
    cancel: CancellationToken,
}

struct ActiveRest {
    id: u64,
    replace_placeholder: bool,
    cancel: CancellationToken,
}

pub struct ChatSession<T: ChatTransport> {
    transport: Arc<T>,
    backend: BackendKind,
    messages: MessageLog,
    sources: Option<Vec<Source>>,
    status: SessionStatus,
    fallback_reason: Option<ChatError>,
    stream: Option<ActiveStream>,
    rest: Option<ActiveRest>,
    next_id: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<T: ChatTransport> ChatSession<T> {
    /// The returned receiver must be drained into [`ChatSession::apply`],
    /// either by the caller's event loop or by [`ChatSession::settle`].
    pub fn new(transport: T, backend: BackendKind) -> (Self, SessionEvents) {
        Self::with_transport(Arc::new(transport), backend)
    }

    pub fn with_transport(transport: Arc<T>, backend: BackendKind) -> (Self, SessionEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            transport,
            backend,
            messages: MessageLog::new(),
            sources: None,
            status: SessionStatus::Idle,
            fallback_reason: None,
            stream: None,
            rest: None,
            next_id: 0,
            events,
        };
        (session, rx)
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn sources(&self) -> Option<&[Source]> {
        self.sources.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Why the current exchange left the streaming channel, if it did.
    pub fn fallback_reason(&self) -> Option<&ChatError> {
        self.fallback_reason.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Takes effect from the next exchange.
    pub fn set_backend(&mut self, backend: BackendKind) {
        self.backend = backend;
    }

    /// Add an informational line to the log. Skipped while an answer is
    /// still arriving so it can't split the assistant message.
    pub fn notice(&mut self, text: impl Into<String>) {
        if !self.is_busy() {
            self.messages.push_system(text);
        }
    }

    /// Whether a submission of `input` would be accepted right now.
    pub fn can_send(&self, input: &str) -> bool {
        !input.trim().is_empty() && !self.is_busy()
    }

    /// Start a new exchange over the streaming channel.
    ///
    /// Must be called within a tokio runtime.
    pub fn ask(&mut self, question: impl Into<String>) {
        let question = question.into();
        self.release();

        self.messages.push_user(question.clone());
        self.sources = None;
        self.fallback_reason = None;
        self.status = SessionStatus::Connecting;

        let endpoint = match self.transport.stream_endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::warn!("chat stream unavailable, using REST: {}", e);
                self.fallback_reason = Some(e);
                self.status = SessionStatus::Idle;
                self.ask_rest(question, false);
                return;
            }
        };

        let id = self.allocate_id();
        let cancel = CancellationToken::new();
        let request = ChatRequest {
            question: question.clone(),
            backend: self.backend,
        };
        tokio::spawn(drive_stream(
            Arc::clone(&self.transport),
            endpoint,
            request,
            id,
            self.events.clone(),
            cancel.clone(),
        ));
        self.stream = Some(ActiveStream {
            id,
            question,
            cancel,
        });
    }

    /// Ask over `POST /chat`, superseding any REST request still in flight.
    ///
    /// With `replace_placeholder` the answer overwrites the trailing
    /// assistant message instead of appending a new one.
    pub fn ask_rest(&mut self, question: String, replace_placeholder: bool) {
        if let Some(previous) = self.rest.take() {
            tracing::debug!("superseding chat request {}", previous.id);
            previous.cancel.cancel();
        }

        self.status = SessionStatus::Sending;
        self.sources = None;

        let id = self.allocate_id();
        let cancel = CancellationToken::new();
        let request = ChatRequest {
            question,
            backend: self.backend,
        };
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => Err(ChatError::Cancelled),
                result = transport.post_chat(&request) => result,
            };
            let _ = events.send(SessionEvent::RestCompleted {
                request: id,
                result,
            });
        });

        self.rest = Some(ActiveRest {
            id,
            replace_placeholder,
            cancel,
        });
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StreamOpened { stream } if self.is_current_stream(stream) => {
                if self.status == SessionStatus::Connecting {
                    self.status = SessionStatus::Streaming;
                }
            }
            SessionEvent::StreamFrame { stream, frame } if self.is_current_stream(stream) => {
                self.on_frame(frame);
            }
            SessionEvent::StreamFailed { stream, error } if self.is_current_stream(stream) => {
                self.fall_back(error);
            }
            SessionEvent::StreamClosed { stream } if self.is_current_stream(stream) => {
                tracing::debug!("chat stream {} closed before completion", stream);
                self.stream = None;
                self.status = SessionStatus::Idle;
                self.messages.drop_if_empty_trailing_assistant();
            }
            SessionEvent::RestCompleted { request, result } if self.is_current_rest(request) => {
                self.on_rest_completed(result);
            }
            other => tracing::trace!("discarding stale session event {:?}", other),
        }
    }

    /// Apply events until the current exchange has finished.
    pub async fn settle(&mut self, events: &mut SessionEvents) {
        while self.is_busy() {
            match events.recv().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }

    /// Close the stream and cancel any REST request. Anything they produce
    /// afterwards is ignored.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.cancel.cancel();
        }
        if let Some(rest) = self.rest.take() {
            rest.cancel.cancel();
        }
    }

    pub fn teardown(&mut self) {
        self.release();
        self.status = SessionStatus::Idle;
    }

    fn on_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Text(chunk) => {
                if self.status == SessionStatus::Connecting {
                    self.status = SessionStatus::Streaming;
                }
                self.messages.append_fragment(&chunk);
            }
            Frame::Sources(sources) => self.sources = sources,
            Frame::Done => {
                if let Some(stream) = self.stream.take() {
                    stream.cancel.cancel();
                }
                self.status = SessionStatus::Idle;
            }
            Frame::Error(message) => self.fall_back(ChatError::Application(message)),
            Frame::Unknown => tracing::debug!("ignoring unrecognised control frame"),
        }
    }

    /// Abandon the stream and re-ask over REST. The answer is appended as a
    /// new message; an empty in-progress message is removed first so it
    /// doesn't linger ahead of it.
    fn fall_back(&mut self, reason: ChatError) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        tracing::warn!("chat stream abandoned, falling back to REST: {}", reason);
        self.fallback_reason = Some(reason);
        stream.cancel.cancel();
        self.status = SessionStatus::Idle;
        self.messages.drop_if_empty_trailing_assistant();
        self.ask_rest(stream.question, false);
    }

    fn on_rest_completed(&mut self, result: Result<ChatResponse>) {
        let replace = self
            .rest
            .take()
            .is_some_and(|rest| rest.replace_placeholder);

        let content = match result {
            Ok(response) => {
                self.sources = response.sources;
                response.answer
            }
            Err(e) => {
                tracing::warn!("chat request failed: {}", e);
                FALLBACK_ANSWER.to_string()
            }
        };

        if replace {
            self.messages.replace_trailing_assistant_content(content);
        } else {
            self.messages.push_assistant(content);
        }
        self.status = SessionStatus::Idle;
    }

    fn is_current_stream(&self, id: u64) -> bool {
        self.stream.as_ref().is_some_and(|s| s.id == id)
    }

    fn is_current_rest(&self, id: u64) -> bool {
        self.rest.as_ref().is_some_and(|r| r.id == id)
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl<T: ChatTransport> Drop for ChatSession<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Own one streaming connection: open it, send the question once the open
/// is acknowledged, then forward classified frames until it ends or the
/// session cancels it.
async fn drive_stream<T: ChatTransport>(
    transport: Arc<T>,
    endpoint: Url,
    request: ChatRequest,
    id: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = transport.open_stream(&endpoint) => opened,
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(error) => {
            let _ = events.send(SessionEvent::StreamFailed { stream: id, error });
            return;
        }
    };
    if cancel.is_cancelled() {
        conn.close().await;
        return;
    }
    let _ = events.send(SessionEvent::StreamOpened { stream: id });

    let sent = match serde_json::to_string(&request) {
        Ok(payload) => conn.send_text(payload).await,
        Err(e) => Err(e.into()),
    };
    if let Err(error) = sent {
        conn.close().await;
        let _ = events.send(SessionEvent::StreamFailed { stream: id, error });
        return;
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                conn.close().await;
                return;
            }
            next = conn.next_frame() => match next {
                Some(Ok(raw)) => {
                    let frame = Frame::classify(raw);
                    if events.send(SessionEvent::StreamFrame { stream: id, frame }).is_err() {
                        conn.close().await;
                        return;
                    }
                }
                Some(Err(error)) => {
                    conn.close().await;
                    let _ = events.send(SessionEvent::StreamFailed { stream: id, error });
                    return;
                }
                None => {
                    let _ = events.send(SessionEvent::StreamClosed { stream: id });
                    return;
                }
            }
        }
    }
}
