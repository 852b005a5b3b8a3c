//! Chat session scenarios against a scripted transport.

mod common;

use std::time::Duration;

use common::{answer, drain, settle, source, step, text, OpenScript, RestScript, ScriptedTransport};
use unichatbot_core::{
    BackendKind, ChatError, ChatRole, ChatSession, SessionStatus, FALLBACK_ANSWER,
};

fn contents<T: unichatbot_core::ChatTransport>(session: &ChatSession<T>) -> Vec<(ChatRole, String)> {
    session
        .messages()
        .messages()
        .iter()
        .map(|m| (m.role, m.content.clone()))
        .collect()
}

#[tokio::test]
async fn streamed_answer_with_sources() {
    let transport = ScriptedTransport::new().on_open(OpenScript::Frames {
        frames: vec![
            text("Atten"),
            text("dance requires 75%."),
            text(r#"{"type":"sources","sources":[{"file":"policy.pdf","page":3}]}"#),
            text(r#"{"type":"done"}"#),
        ],
        hold_open: true,
    });
    let recorder = transport.recorder();
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("What is the attendance policy?");
    assert_eq!(session.status(), SessionStatus::Connecting);
    settle(&mut session, &mut events).await;

    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(
        contents(&session),
        vec![
            (ChatRole::User, "What is the attendance policy?".to_string()),
            (ChatRole::Assistant, "Attendance requires 75%.".to_string()),
        ]
    );
    assert_eq!(session.sources(), Some(&[source("policy.pdf", 3)][..]));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let recorder = recorder.lock().unwrap();
    assert_eq!(
        recorder.sent,
        vec![r#"{"question":"What is the attendance policy?","backend":"weaviate"}"#]
    );
    assert!(recorder.closed, "client closes the channel after done");
    assert!(recorder.posted.is_empty());
    drop(recorder);
    assert!(session.fallback_reason().is_none());
}

#[tokio::test]
async fn status_moves_to_streaming_once_open() {
    let transport = ScriptedTransport::new().on_open(OpenScript::Frames {
        frames: vec![],
        hold_open: true,
    });
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Chroma);

    session.ask("hello");
    step(&mut session, &mut events).await;
    assert_eq!(session.status(), SessionStatus::Streaming);
}

#[tokio::test]
async fn frames_after_done_are_ignored() {
    let transport = ScriptedTransport::new().on_open(OpenScript::Frames {
        frames: vec![text("Hello"), text(r#"{"type":"done"}"#), text(" world")],
        hold_open: true,
    });
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("hi");
    settle(&mut session, &mut events).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    drain(&mut session, &mut events);

    assert_eq!(session.messages().last().unwrap().content, "Hello");
    assert_eq!(session.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn unbuildable_channel_goes_straight_to_rest() {
    let transport = ScriptedTransport::new()
        .without_stream()
        .on_rest(answer("Exams can be retaken once.", None));
    let recorder = transport.recorder();
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Chroma);

    session.ask("Can I retake an exam?");
    assert_eq!(session.status(), SessionStatus::Sending);
    settle(&mut session, &mut events).await;

    assert_eq!(
        contents(&session),
        vec![
            (ChatRole::User, "Can I retake an exam?".to_string()),
            (ChatRole::Assistant, "Exams can be retaken once.".to_string()),
        ]
    );
    let recorder = recorder.lock().unwrap();
    assert_eq!(recorder.opened, 0);
    assert_eq!(recorder.posted.len(), 1);
    assert_eq!(recorder.posted[0].question, "Can I retake an exam?");
    assert_eq!(recorder.posted[0].backend, BackendKind::Chroma);
}

#[tokio::test]
async fn connect_failure_falls_back_to_rest() {
    let transport = ScriptedTransport::new()
        .on_open(OpenScript::Fail(ChatError::Connection("refused".into())))
        .on_rest(answer("From REST", Some(vec![source("credits.pdf", 1)])));
    let recorder = transport.recorder();
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("How many credits?");
    settle(&mut session, &mut events).await;

    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages().last().unwrap().content, "From REST");
    assert_eq!(session.sources(), Some(&[source("credits.pdf", 1)][..]));
    assert_eq!(
        session.fallback_reason(),
        Some(&ChatError::Connection("refused".into()))
    );
    assert_eq!(recorder.lock().unwrap().posted.len(), 1);
}

#[tokio::test]
async fn receive_error_mid_stream_falls_back() {
    let transport = ScriptedTransport::new()
        .on_open(OpenScript::Frames {
            frames: vec![text("Partial"), Err(ChatError::Connection("reset".into()))],
            hold_open: false,
        })
        .on_rest(answer("Complete answer", None));
    let recorder = transport.recorder();
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    settle(&mut session, &mut events).await;

    assert_eq!(
        contents(&session),
        vec![
            (ChatRole::User, "q".to_string()),
            (ChatRole::Assistant, "Partial".to_string()),
            (ChatRole::Assistant, "Complete answer".to_string()),
        ]
    );
    let recorder = recorder.lock().unwrap();
    assert!(recorder.closed);
    assert_eq!(recorder.posted.len(), 1);
}

#[tokio::test]
async fn error_frame_appends_rest_answer_and_resets_sources() {
    let transport = ScriptedTransport::new()
        .on_open(OpenScript::Frames {
            frames: vec![
                text("Partial"),
                text(r#"{"type":"sources","sources":[{"file":"old.pdf","page":9}]}"#),
                text(r#"{"type":"error","message":"generation failed"}"#),
            ],
            hold_open: true,
        })
        .on_rest(answer("Recovered", None));
    let recorder = transport.recorder();
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    // opened, fragment, sources
    for _ in 0..3 {
        step(&mut session, &mut events).await;
    }
    assert_eq!(session.sources(), Some(&[source("old.pdf", 9)][..]));

    step(&mut session, &mut events).await;
    assert_eq!(session.status(), SessionStatus::Sending);
    assert!(session.sources().is_none());

    settle(&mut session, &mut events).await;
    assert_eq!(
        contents(&session),
        vec![
            (ChatRole::User, "q".to_string()),
            (ChatRole::Assistant, "Partial".to_string()),
            (ChatRole::Assistant, "Recovered".to_string()),
        ]
    );
    assert!(session.sources().is_none());
    assert_eq!(
        session.fallback_reason(),
        Some(&ChatError::Application("generation failed".into()))
    );
    assert_eq!(recorder.lock().unwrap().posted.len(), 1);
}

#[tokio::test]
async fn error_frame_before_any_text_leaves_no_empty_message() {
    let transport = ScriptedTransport::new()
        .on_open(OpenScript::Frames {
            frames: vec![text(""), text(r#"{"type":"error"}"#)],
            hold_open: true,
        })
        .on_rest(answer("Recovered", None));
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    settle(&mut session, &mut events).await;

    assert_eq!(
        contents(&session),
        vec![
            (ChatRole::User, "q".to_string()),
            (ChatRole::Assistant, "Recovered".to_string()),
        ]
    );
}

#[tokio::test]
async fn close_without_done_keeps_partial_text() {
    let transport = ScriptedTransport::new().on_open(OpenScript::Frames {
        frames: vec![text("Half an ans")],
        hold_open: false,
    });
    let recorder = transport.recorder();
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    settle(&mut session, &mut events).await;

    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(session.messages().last().unwrap().content, "Half an ans");
    assert!(recorder.lock().unwrap().posted.is_empty());
}

#[tokio::test]
async fn close_without_done_drops_empty_assistant() {
    let transport = ScriptedTransport::new().on_open(OpenScript::Frames {
        frames: vec![text("")],
        hold_open: false,
    });
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    settle(&mut session, &mut events).await;

    assert_eq!(contents(&session), vec![(ChatRole::User, "q".to_string())]);
}

#[tokio::test]
async fn malformed_json_frame_is_answer_text() {
    let transport = ScriptedTransport::new().on_open(OpenScript::Frames {
        frames: vec![text("{braces} are fine"), text(r#"{"type":"done"}"#)],
        hold_open: false,
    });
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    settle(&mut session, &mut events).await;

    assert_eq!(session.messages().last().unwrap().content, "{braces} are fine");
}

#[tokio::test]
async fn rest_failure_shows_fixed_apology() {
    let transport = ScriptedTransport::new()
        .without_stream()
        .on_rest(RestScript::Respond(Err(ChatError::Transport("HTTP 503".into()))));
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    settle(&mut session, &mut events).await;

    assert_eq!(session.messages().last().unwrap().content, FALLBACK_ANSWER);
    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.sources().is_none());
}

#[tokio::test]
async fn newer_rest_request_supersedes_older() {
    let transport = ScriptedTransport::new()
        .on_rest(RestScript::Hang)
        .on_rest(answer("second", None));
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask_rest("first".into(), false);
    session.ask_rest("second".into(), false);
    settle(&mut session, &mut events).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    drain(&mut session, &mut events);

    assert_eq!(
        contents(&session),
        vec![(ChatRole::Assistant, "second".to_string())]
    );
}

#[tokio::test]
async fn replace_placeholder_overwrites_trailing_assistant() {
    let transport = ScriptedTransport::new()
        .on_open(OpenScript::Frames {
            frames: vec![text("draft")],
            hold_open: false,
        })
        .on_rest(answer("final", None));
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    settle(&mut session, &mut events).await;
    let draft_id = session.messages().last().unwrap().id;

    session.ask_rest("q".into(), true);
    settle(&mut session, &mut events).await;

    assert_eq!(session.messages().len(), 2);
    let last = session.messages().last().unwrap();
    assert_eq!(last.id, draft_id);
    assert_eq!(last.content, "final");
}

#[tokio::test]
async fn new_question_closes_previous_stream() {
    let transport = ScriptedTransport::new()
        .on_open(OpenScript::Frames {
            frames: vec![],
            hold_open: true,
        })
        .on_open(OpenScript::Frames {
            frames: vec![text("B"), text(r#"{"type":"done"}"#)],
            hold_open: false,
        });
    let recorder = transport.recorder();
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("first");
    step(&mut session, &mut events).await;
    session.ask("second");
    settle(&mut session, &mut events).await;

    assert_eq!(
        contents(&session),
        vec![
            (ChatRole::User, "first".to_string()),
            (ChatRole::User, "second".to_string()),
            (ChatRole::Assistant, "B".to_string()),
        ]
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(recorder.lock().unwrap().closed);
}

#[tokio::test]
async fn teardown_discards_in_flight_work() {
    let transport = ScriptedTransport::new()
        .without_stream()
        .on_rest(RestScript::Hang);
    let (mut session, mut events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.ask("q");
    assert!(session.is_busy());
    session.teardown();
    assert_eq!(session.status(), SessionStatus::Idle);

    tokio::time::sleep(Duration::from_millis(20)).await;
    drain(&mut session, &mut events);
    assert_eq!(contents(&session), vec![(ChatRole::User, "q".to_string())]);
}

#[tokio::test]
async fn cannot_send_blank_or_while_busy() {
    let transport = ScriptedTransport::new().without_stream().on_rest(RestScript::Hang);
    let (mut session, _events) = ChatSession::new(transport, BackendKind::Weaviate);

    assert!(!session.can_send("   "));
    assert!(session.can_send("hi"));
    session.ask("hi");
    assert!(!session.can_send("again"));
}

#[tokio::test]
async fn notice_waits_until_idle() {
    let transport = ScriptedTransport::new().without_stream().on_rest(RestScript::Hang);
    let (mut session, _events) = ChatSession::new(transport, BackendKind::Weaviate);

    session.notice("Using the Chroma backend.");
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages().messages()[0].role, ChatRole::System);

    session.ask("hi");
    session.notice("Using the Weaviate backend.");
    assert_eq!(session.messages().len(), 2);
}
