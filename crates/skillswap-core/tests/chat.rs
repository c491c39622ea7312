mod common;

use common::{app, app_with_retries, next_event, next_messages, Backend};
use serde_json::json;
use skillswap_core::{ChatEvent, ChatSession, ChatState, CoreError};
use skillswap_http::types::Method;
use skillswap_http::StreamEvent;
use std::sync::Arc;
use std::time::Duration;

const THREAD: &str = "Chats/ann_bob/messages";

fn seed_thread(backend: &Backend) {
    backend.store.seed(
        THREAD,
        json!({
            "-Na": {"senderID": "ann", "recipientID": "bob", "text": "later", "timestamp": "2024-05-01T10:05:00.000Z"},
            "-Nb": {"senderID": "bob", "recipientID": "ann", "text": "earlier", "timestamp": "2024-05-01T10:00:00.000Z"}
        }),
    );
}

/// Connect and wait until the stream's own first snapshot has been applied.
async fn live_session(backend: &Arc<Backend>, me: &str, peer: &str) -> ChatSession {
    let mut session = app(backend).chat(me, peer);
    let events = session.events();
    session.connect().await.unwrap();
    loop {
        match next_event(&events).await {
            ChatEvent::Opened => break,
            ChatEvent::Messages(_) | ChatEvent::ConnectionError(_) => {}
            other => panic!("unexpected event {:?}", other),
        }
    }
    next_messages(&events).await;
    session
}

async fn wait_for_text(session: &ChatSession, text: &str) -> Vec<skillswap_core::ChatMessage> {
    let events = session.events();
    loop {
        let messages = next_messages(&events).await;
        if messages.iter().any(|m| m.text == text) {
            return messages;
        }
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn connect_shows_snapshot_in_timestamp_order() {
    let backend = Backend::new();
    seed_thread(&backend);
    let session = live_session(&backend, "bob", "ann").await;

    assert_eq!(session.conversation_id(), "ann_bob");
    assert_eq!(session.state(), ChatState::Live);
    let texts: Vec<_> = session.messages().iter().map(|m| m.text.clone()).collect();
    assert_eq!(texts, ["earlier", "later"]);
}

#[tokio::test]
async fn both_participants_see_a_sent_message() {
    let backend = Backend::new();
    let ann = live_session(&backend, "ann", "bob").await;
    let bob = live_session(&backend, "bob", "ann").await;

    let key = ann.send_message("hello bob").await.unwrap();

    for session in [&ann, &bob] {
        let messages = wait_for_text(session, "hello bob").await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, key);
        assert_eq!(messages[0].sender_id, "ann");
        assert_eq!(messages[0].recipient_id, "bob");
    }
    assert_eq!(backend.store.value(&format!("{}/{}/text", THREAD, key)), "hello bob");
}

#[tokio::test]
async fn whitespace_message_is_rejected_without_request() {
    let backend = Backend::new();
    let session = live_session(&backend, "ann", "bob").await;

    let err = session.send_message("  ").await.unwrap_err();
    assert!(matches!(err, CoreError::EmptyMessage));
    assert_eq!(err.user_message(), "Message cannot be empty.");
    assert_eq!(backend.store.request_count(Method::Post, THREAD), 0);
}

#[tokio::test]
async fn failed_send_is_reported() {
    let backend = Backend::new();
    let session = live_session(&backend, "ann", "bob").await;

    backend.store.fail_next(Method::Post, THREAD, 500, 1);
    let err = session.send_message("hi").await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to send message.");
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn malformed_event_keeps_previous_messages() {
    let backend = Backend::new();
    seed_thread(&backend);
    let session = live_session(&backend, "ann", "bob").await;
    let events = session.events();

    backend.store.push_event(THREAD, StreamEvent::new("put", "{not json"));

    assert_eq!(
        next_event(&events).await,
        ChatEvent::ParseFailed("Failed to process message.".into())
    );
    let view = session.view();
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.last_error.as_deref(), Some("Failed to process message."));

    session.dismiss_error();
    assert!(session.view().last_error.is_none());
}

#[tokio::test]
async fn child_update_triggers_full_refetch() {
    let backend = Backend::new();
    seed_thread(&backend);
    let session = live_session(&backend, "ann", "bob").await;

    // Written behind the stream's back, then announced as a child change.
    backend.store.seed(
        &format!("{}/-Nc", THREAD),
        json!({"senderID": "bob", "recipientID": "ann", "text": "newest", "timestamp": "2024-05-01T11:00:00.000Z"}),
    );
    backend.store.push_event(
        THREAD,
        StreamEvent::new("put", r#"{"path":"/-Nc","data":{"text":"newest"}}"#),
    );

    let messages = wait_for_text(&session, "newest").await;
    let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["earlier", "later", "newest"]);
}

#[tokio::test]
async fn server_cancel_degrades_view() {
    let backend = Backend::new();
    let session = live_session(&backend, "ann", "bob").await;
    let events = session.events();

    backend.store.push_event(THREAD, StreamEvent::new("cancel", "Permission denied"));

    assert_eq!(
        next_event(&events).await,
        ChatEvent::ConnectionError("Connection error. Please try again.".into())
    );
    assert!(session.view().degraded);
    assert_eq!(session.state(), ChatState::Live);
}

#[tokio::test]
async fn dropped_stream_is_reported() {
    let backend = Backend::new();
    let session = live_session(&backend, "ann", "bob").await;
    let events = session.events();

    backend.store.close_streams();

    assert!(matches!(next_event(&events).await, ChatEvent::ConnectionError(_)));
    assert!(session.view().degraded);
}

#[tokio::test]
async fn snapshot_failure_still_attaches_stream() {
    let backend = Backend::new();
    seed_thread(&backend);
    backend.store.fail_next(Method::Get, THREAD, 500, 1);

    let mut session = app(&backend).chat("ann", "bob");
    let events = session.events();
    session.connect().await.unwrap();

    assert_eq!(
        next_event(&events).await,
        ChatEvent::ConnectionError("Failed to load messages.".into())
    );
    assert_eq!(next_event(&events).await, ChatEvent::Opened);
    assert_eq!(next_messages(&events).await.len(), 2);
    assert!(!session.view().degraded);
}

#[tokio::test]
async fn failed_attach_can_be_retried() {
    let backend = Backend::new();
    let mut session = app(&backend).chat("ann", "bob");

    // One GET for the snapshot, one for the stream.
    backend.store.fail_next(Method::Get, THREAD, 401, 2);
    assert!(session.connect().await.is_err());
    assert_eq!(session.state(), ChatState::Idle);

    session.connect().await.unwrap();
    assert_eq!(session.state(), ChatState::Live);
}

#[tokio::test]
async fn disconnect_releases_stream_and_ignores_later_updates() {
    let backend = Backend::new();
    let mut session = live_session(&backend, "ann", "bob").await;
    let events = session.events();
    assert_eq!(backend.store.open_streams(), 1);

    session.disconnect();
    assert_eq!(session.state(), ChatState::Closed);
    assert_eq!(next_event(&events).await, ChatEvent::Closed);
    assert!(events.recv().await.is_err());

    wait_until(|| backend.store.open_streams() == 0).await;

    let other = live_session(&backend, "bob", "ann").await;
    other.send_message("after close").await.unwrap();
    wait_for_text(&other, "after close").await;
    assert!(session.messages().is_empty());

    assert!(matches!(session.connect().await, Err(CoreError::SessionClosed)));
    assert!(matches!(session.refresh().await, Err(CoreError::SessionClosed)));
}

#[tokio::test]
async fn dropping_session_releases_stream() {
    let backend = Backend::new();
    let session = live_session(&backend, "ann", "bob").await;
    assert_eq!(backend.store.open_streams(), 1);

    drop(session);
    wait_until(|| backend.store.open_streams() == 0).await;
}

#[tokio::test]
async fn refresh_refetches_on_demand() {
    let backend = Backend::new();
    let session = live_session(&backend, "ann", "bob").await;

    seed_thread(&backend);
    session.refresh().await.unwrap();
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn lost_send_response_is_not_resent() {
    let backend = Backend::new();
    seed_thread(&backend);
    let session = app_with_retries(&backend).chat("ann", "bob");

    backend.lose_post_responses(1);
    let err = session.send_message("hello").await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to send message.");

    assert_eq!(backend.store.request_count(Method::Post, THREAD), 1);
    let stored = backend.store.value(THREAD);
    let hellos = stored
        .as_object()
        .unwrap()
        .values()
        .filter(|m| m["text"] == "hello")
        .count();
    assert_eq!(hellos, 1);
}
