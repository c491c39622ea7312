use super::{conversation_id, interpret_event, normalize_messages, StreamUpdate};
use crate::error::{Action, CoreError, Result};
use crate::models::{now_timestamp, ChatMessage};
use crate::store;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use skillswap_http::client::{KeepAliveConfig, Subscription};
use skillswap_http::StoreClient;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    /// Fetching the initial snapshot.
    Loading,
    /// Stream attached.
    Live,
    Closed,
}

/// What the conversation screen shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatView {
    pub messages: Vec<ChatMessage>,
    /// The stream failed and has not delivered anything since.
    pub degraded: bool,
    /// Banner text, kept until dismissed.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Opened,
    /// The full, ordered thread. Also the cue to scroll to the end.
    Messages(Vec<ChatMessage>),
    ConnectionError(String),
    ParseFailed(String),
    Closed,
}

/// The view plus the ticket of the list it currently shows.
#[derive(Default)]
struct Tracked {
    view: ChatView,
    shown: u64,
}

/// State shared with the stream reader. Nothing is written once `live` is
/// cleared.
struct Shared {
    view: Mutex<Tracked>,
    live: AtomicBool,
    /// Last ticket handed out. A list may only replace one fetched earlier.
    tickets: AtomicU64,
    events: async_channel::Sender<ChatEvent>,
}

impl Shared {
    fn new(events: async_channel::Sender<ChatEvent>) -> Self {
        Self {
            view: Mutex::new(Tracked::default()),
            live: AtomicBool::new(false),
            tickets: AtomicU64::new(0),
            events,
        }
    }

    /// Taken when a fetch starts or a stream snapshot arrives.
    fn ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.try_send(event);
    }

    fn replace(&self, ticket: u64, messages: Vec<ChatMessage>) {
        if !self.is_live() {
            return;
        }
        {
            let mut tracked = self.view.lock();
            if ticket < tracked.shown {
                debug!("[Chat] Dropping stale list {} (showing {})", ticket, tracked.shown);
                return;
            }
            tracked.shown = ticket;
            tracked.view.messages = messages.clone();
            tracked.view.degraded = false;
        }
        self.emit(ChatEvent::Messages(messages));
    }

    fn connection_error(&self, message: &str) {
        if !self.is_live() {
            return;
        }
        {
            let mut tracked = self.view.lock();
            tracked.view.degraded = true;
            tracked.view.last_error = Some(message.to_string());
        }
        self.emit(ChatEvent::ConnectionError(message.to_string()));
    }

    fn parse_failed(&self) {
        if !self.is_live() {
            return;
        }
        let message = CoreError::MalformedPayload(String::new()).user_message();
        self.view.lock().view.last_error = Some(message.clone());
        self.emit(ChatEvent::ParseFailed(message));
    }
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

/// A two-party conversation, live while connected.
///
/// The stream is released by [`ChatSession::disconnect`] or, failing that,
/// when the session is dropped.
pub struct ChatSession {
    store: StoreClient,
    self_id: String,
    peer_id: String,
    conversation_id: String,
    path: String,
    keep_alive: Option<KeepAliveConfig>,
    state: ChatState,
    shared: Arc<Shared>,
    events: async_channel::Receiver<ChatEvent>,
    reader: Option<JoinHandle<()>>,
}

impl ChatSession {
    pub fn new(store: StoreClient, self_id: &str, peer_id: &str) -> Self {
        let conversation_id = conversation_id(self_id, peer_id);
        let path = store::chat_messages(&conversation_id);
        let (tx, rx) = async_channel::unbounded();
        Self {
            store,
            self_id: self_id.to_string(),
            peer_id: peer_id.to_string(),
            conversation_id,
            path,
            keep_alive: None,
            state: ChatState::Idle,
            shared: Arc::new(Shared::new(tx)),
            events: rx,
            reader: None,
        }
    }

    /// Treat the stream as broken when nothing, keep-alives included,
    /// arrives for longer than the config allows.
    pub fn with_keep_alive(mut self, config: KeepAliveConfig) -> Self {
        self.keep_alive = Some(config);
        self
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Events for the view. Every clone sees each event once between them.
    pub fn events(&self) -> async_channel::Receiver<ChatEvent> {
        self.events.clone()
    }

    pub fn view(&self) -> ChatView {
        self.shared.view.lock().view.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.shared.view.lock().view.messages.clone()
    }

    pub fn dismiss_error(&self) {
        self.shared.view.lock().view.last_error = None;
    }

    /// Fetch the snapshot, then attach the stream.
    ///
    /// A failed snapshot is reported and the stream is still attached. A
    /// failed attach returns the session to `Idle` so it can be retried.
    pub async fn connect(&mut self) -> Result<()> {
        match self.state {
            ChatState::Closed => return Err(CoreError::SessionClosed),
            ChatState::Loading | ChatState::Live => return Ok(()),
            ChatState::Idle => {}
        }

        self.shared.live.store(true, Ordering::Release);
        self.state = ChatState::Loading;

        let ticket = self.shared.ticket();
        match fetch_snapshot(&self.store, &self.path).await {
            Ok(messages) => self.shared.replace(ticket, messages),
            Err(e) => {
                warn!("[Chat] Snapshot of {} failed: {}", self.conversation_id, e);
                self.shared.connection_error(&e.user_message());
            }
        }

        let subscription = match self.store.subscribe(&self.path, self.keep_alive.clone()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("[SSE] Could not open {}: {}", self.path, e);
                self.state = ChatState::Idle;
                self.shared.connection_error(Action::Stream.user_message());
                return Err(CoreError::during(Action::Stream, e));
            }
        };

        self.state = ChatState::Live;
        info!("[Chat] {} live", self.conversation_id);
        self.shared.emit(ChatEvent::Opened);

        self.reader = Some(tokio::spawn(read_stream(
            subscription,
            self.store.clone(),
            self.path.clone(),
            self.shared.clone(),
        )));
        Ok(())
    }

    /// Fetch the whole thread again and replace the view, unless a newer
    /// list has been shown by the time it arrives.
    pub async fn refresh(&self) -> Result<()> {
        if self.state == ChatState::Closed {
            return Err(CoreError::SessionClosed);
        }
        let ticket = self.shared.ticket();
        let messages = fetch_snapshot(&self.store, &self.path).await?;
        self.shared.replace(ticket, messages);
        Ok(())
    }

    /// Append a message. The view is not touched; the message shows up with
    /// the next update from the store. Returns the store-assigned key.
    pub async fn send_message(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(CoreError::EmptyMessage);
        }

        let message = ChatMessage {
            id: String::new(),
            sender_id: self.self_id.clone(),
            recipient_id: self.peer_id.clone(),
            text: text.to_string(),
            timestamp: now_timestamp(),
        };
        let response = self
            .store
            .post_json(&self.path, &message)
            .await
            .map_err(|e| {
                warn!("[Chat] Send to {} failed: {}", self.conversation_id, e);
                CoreError::during(Action::SendMessage, e)
            })?;
        let key = response
            .json::<PushResponse>()
            .map(|r| r.name)
            .map_err(|e| CoreError::MalformedPayload(format!("push response: {}", e)))?;

        self.dismiss_error();
        debug!("[Chat] Sent {} in {}", key, self.conversation_id);
        Ok(key)
    }

    /// Stop the stream and discard anything still in flight.
    pub fn disconnect(&mut self) {
        if self.state == ChatState::Closed {
            return;
        }
        self.shared.live.store(false, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.state = ChatState::Closed;
        self.shared.emit(ChatEvent::Closed);
        self.shared.events.close();
        info!("[Chat] {} closed", self.conversation_id);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("conversation_id", &self.conversation_id)
            .field("state", &self.state)
            .finish()
    }
}

async fn fetch_snapshot(store: &StoreClient, path: &str) -> Result<Vec<ChatMessage>> {
    let value: Value = store
        .get_json(path)
        .await
        .map_err(|e| CoreError::during(Action::LoadMessages, e))?;
    normalize_messages(value)
        .ok_or_else(|| CoreError::MalformedPayload(format!("{} is not a collection", path)))
}

async fn read_stream(
    mut subscription: Subscription,
    store: StoreClient,
    path: String,
    shared: Arc<Shared>,
) {
    while let Some(item) = subscription.next().await {
        if !shared.is_live() {
            break;
        }
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                warn!("[SSE] {} failed: {}", path, e);
                shared.connection_error(Action::Stream.user_message());
                if matches!(e, skillswap_http::StoreError::Timeout) {
                    break;
                }
                continue;
            }
        };

        match interpret_event(&event) {
            StreamUpdate::Snapshot(value) => match normalize_messages(value) {
                Some(messages) => shared.replace(shared.ticket(), messages),
                None => {
                    warn!("[SSE] {} sent a non-collection snapshot", path);
                    shared.parse_failed();
                }
            },
            StreamUpdate::Refetch => {
                let ticket = shared.ticket();
                match fetch_snapshot(&store, &path).await {
                    Ok(messages) => shared.replace(ticket, messages),
                    Err(e) => {
                        warn!("[Chat] Refetch of {} failed: {}", path, e);
                        shared.connection_error(&e.user_message());
                    }
                }
            }
            StreamUpdate::Ignore => {}
            StreamUpdate::Ended(reason) => {
                warn!("[SSE] {} ended by server: {}", path, reason);
                shared.connection_error(Action::Stream.user_message());
            }
            StreamUpdate::Malformed(detail) => {
                warn!("[SSE] Error parsing event on {}: {}", path, detail);
                shared.parse_failed();
            }
        }
    }

    if shared.is_live() {
        debug!("[SSE] {} stream ended", path);
        shared.connection_error(Action::Stream.user_message());
    }
}
