//! Direct messages between two users.
//!
//! Both participants address the thread by the same conversation id, and
//! every update from the store carries the whole message collection, which
//! replaces the local list.

mod session;

pub use session::{ChatEvent, ChatSession, ChatState, ChatView};

use crate::models::{decode_collection, ChatMessage};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use skillswap_http::protocol::events;
use skillswap_http::StreamEvent;
use std::cmp::Ordering;

const SEPARATOR: &str = "_";

/// Symmetric id of the conversation between `a` and `b`.
pub fn conversation_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", first, SEPARATOR, second)
}

fn parse_timestamp(ts: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(ts.trim()).ok()
}

/// Ascending by timestamp. Unparsable timestamps sort first; ties fall back
/// to the message key so the order never depends on arrival order.
pub fn compare_messages(a: &ChatMessage, b: &ChatMessage) -> Ordering {
    parse_timestamp(&a.timestamp)
        .cmp(&parse_timestamp(&b.timestamp))
        .then_with(|| a.id.cmp(&b.id))
}

/// Turn a stored collection (`{key: message}` or `null`) into display order.
/// Returns `None` when the value is not a collection at all.
pub fn normalize_messages(value: Value) -> Option<Vec<ChatMessage>> {
    let map = match value {
        Value::Null => return Some(Vec::new()),
        Value::Object(map) => map,
        _ => return None,
    };
    let mut messages: Vec<ChatMessage> = decode_collection::<ChatMessage>("messages", map)
        .into_iter()
        .map(|(id, mut message)| {
            message.id = id;
            message
        })
        .collect();
    messages.sort_by(compare_messages);
    Some(messages)
}

/// What a stream event means for the local message list.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// Replace the list with this collection.
    Snapshot(Value),
    /// Something below the collection changed; fetch the whole thing again.
    Refetch,
    /// Nothing to do.
    Ignore,
    /// The server ended the stream.
    Ended(String),
    /// The payload was not JSON.
    Malformed(String),
}

/// Interpret one event of a collection stream.
///
/// `put`/`patch` carry `{"path", "data"}`. Only a `put` at `/` holds the
/// full collection; anything else triggers a refetch. Data that is not such
/// an envelope is taken to be the collection itself.
pub fn interpret_event(event: &StreamEvent) -> StreamUpdate {
    match event.event.as_str() {
        events::KEEP_ALIVE => StreamUpdate::Ignore,
        events::CANCEL | events::AUTH_REVOKED => StreamUpdate::Ended(event.event.clone()),
        events::PUT | events::PATCH | skillswap_http::protocol::DEFAULT_EVENT => {
            let value: Value = match serde_json::from_str(&event.data) {
                Ok(value) => value,
                Err(e) => return StreamUpdate::Malformed(e.to_string()),
            };
            match envelope(value) {
                Ok((path, data)) => {
                    if event.is(events::PUT) && path == "/" {
                        StreamUpdate::Snapshot(data)
                    } else {
                        StreamUpdate::Refetch
                    }
                }
                Err(collection) => StreamUpdate::Snapshot(collection),
            }
        }
        _ => StreamUpdate::Ignore,
    }
}

/// Split `{"path": "...", "data": ...}`, or give the value back untouched.
fn envelope(value: Value) -> Result<(String, Value), Value> {
    let is_envelope = value.as_object().is_some_and(|obj| {
        obj.len() == 2 && obj.get("path").is_some_and(Value::is_string) && obj.contains_key("data")
    });
    if !is_envelope {
        return Err(value);
    }
    let Value::Object(mut obj) = value else {
        return Err(Value::Null);
    };
    let path = match obj.remove("path") {
        Some(Value::String(path)) => path,
        _ => String::new(),
    };
    let data = obj.remove("data").unwrap_or(Value::Null);
    Ok((path, data))
}
