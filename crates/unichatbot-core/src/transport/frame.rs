use serde_json::Value;

use crate::models::{sources_from_value, Source};

/// An inbound message on the streaming channel, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Answer text, appended verbatim.
    Text(String),
    /// Replaces the citation set. `None` when the payload had no proper list.
    Sources(Option<Vec<Source>>),
    Done,
    Error(String),
    /// Well-formed JSON with a `type` we don't handle.
    Unknown,
}

impl Frame {
    /// Anything starting with `{` is tried as a control frame first. If it
    /// doesn't parse, it is answer text like everything else.
    pub fn classify(raw: String) -> Frame {
        if !raw.starts_with('{') {
            return Frame::Text(raw);
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(payload) => Self::from_control(payload),
            Err(_) => Frame::Text(raw),
        }
    }

    fn from_control(mut payload: Value) -> Frame {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);
        match kind.as_deref() {
            Some("sources") => {
                Frame::Sources(sources_from_value(payload.get_mut("sources").map(Value::take)))
            }
            Some("done") => Frame::Done,
            Some("error") => Frame::Error(
                ["message", "detail"]
                    .iter()
                    .find_map(|key| payload.get(*key).and_then(Value::as_str))
                    .unwrap_or("server reported an error")
                    .to_string(),
            ),
            _ => Frame::Unknown,
        }
    }
}
