//! In-memory transport for driving `ChatSession` through scripted
//! stream and REST behaviour.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use unichatbot_core::error::Result;
use unichatbot_core::{
    ChatError, ChatRequest, ChatResponse, ChatSession, ChatTransport, FrameStream, SessionEvents,
    Source,
};

/// How the next `open_stream` call behaves.
#[allow(dead_code)]
pub enum OpenScript {
    Fail(ChatError),
    Frames {
        frames: Vec<Result<String>>,
        /// Keep the connection open after the last frame instead of closing.
        hold_open: bool,
    },
}

#[allow(dead_code)]
pub enum RestScript {
    Respond(Result<ChatResponse>),
    /// Never completes; only cancellation ends it.
    Hang,
}

#[derive(Default)]
pub struct Recorder {
    pub opened: usize,
    pub sent: Vec<String>,
    pub closed: bool,
    pub posted: Vec<ChatRequest>,
}

pub struct ScriptedTransport {
    endpoint: Result<Url>,
    opens: Mutex<VecDeque<OpenScript>>,
    rests: Mutex<VecDeque<RestScript>>,
    pub recorder: Arc<Mutex<Recorder>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            endpoint: Ok(Url::parse("ws://scripted.test/ws/chat").expect("valid url")),
            opens: Mutex::new(VecDeque::new()),
            rests: Mutex::new(VecDeque::new()),
            recorder: Arc::new(Mutex::new(Recorder::default())),
        }
    }

    pub fn without_stream(mut self) -> Self {
        self.endpoint = Err(ChatError::Connection("malformed endpoint".to_string()));
        self
    }

    pub fn on_open(self, script: OpenScript) -> Self {
        self.opens.lock().unwrap().push_back(script);
        self
    }

    pub fn on_rest(self, script: RestScript) -> Self {
        self.rests.lock().unwrap().push_back(script);
        self
    }

    pub fn recorder(&self) -> Arc<Mutex<Recorder>> {
        Arc::clone(&self.recorder)
    }
}

struct ScriptedStream {
    frames: VecDeque<Result<String>>,
    hold_open: bool,
    recorder: Arc<Mutex<Recorder>>,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.recorder.lock().unwrap().sent.push(text);
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<String>> {
        match self.frames.pop_front() {
            Some(frame) => Some(frame),
            None if self.hold_open => std::future::pending().await,
            None => None,
        }
    }

    async fn close(&mut self) {
        self.recorder.lock().unwrap().closed = true;
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn stream_endpoint(&self) -> Result<Url> {
        self.endpoint.clone()
    }

    async fn open_stream(&self, _endpoint: &Url) -> Result<Box<dyn FrameStream>> {
        self.recorder.lock().unwrap().opened += 1;
        let script = self.opens.lock().unwrap().pop_front();
        match script {
            Some(OpenScript::Fail(error)) => Err(error),
            Some(OpenScript::Frames { frames, hold_open }) => Ok(Box::new(ScriptedStream {
                frames: frames.into(),
                hold_open,
                recorder: Arc::clone(&self.recorder),
            })),
            None => Err(ChatError::Connection("no stream scripted".to_string())),
        }
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.recorder.lock().unwrap().posted.push(request.clone());
        let script = self.rests.lock().unwrap().pop_front();
        match script {
            Some(RestScript::Respond(result)) => result,
            Some(RestScript::Hang) => std::future::pending().await,
            None => Err(ChatError::Transport("no response scripted".to_string())),
        }
    }
}

#[allow(dead_code)]
pub fn text(s: &str) -> Result<String> {
    Ok(s.to_string())
}

#[allow(dead_code)]
pub fn answer(text: &str, sources: Option<Vec<Source>>) -> RestScript {
    RestScript::Respond(Ok(ChatResponse {
        answer: text.to_string(),
        sources,
        backend: None,
    }))
}

#[allow(dead_code)]
pub fn source(file: &str, page: u32) -> Source {
    Source {
        file: Some(file.to_string()),
        page: Some(page),
    }
}

/// Receive and apply one event, failing the test if none arrives.
#[allow(dead_code)]
pub async fn step<T: ChatTransport>(session: &mut ChatSession<T>, events: &mut SessionEvents) {
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed");
    session.apply(event);
}

/// Settle with a deadline so a stuck exchange fails instead of hanging.
#[allow(dead_code)]
pub async fn settle<T: ChatTransport>(session: &mut ChatSession<T>, events: &mut SessionEvents) {
    tokio::time::timeout(Duration::from_secs(2), session.settle(events))
        .await
        .expect("exchange did not settle");
}

/// Apply whatever is already queued without waiting.
#[allow(dead_code)]
pub fn drain<T: ChatTransport>(session: &mut ChatSession<T>, events: &mut SessionEvents) -> usize {
    let mut applied = 0;
    while let Ok(event) = events.try_recv() {
        session.apply(event);
        applied += 1;
    }
    applied
}
