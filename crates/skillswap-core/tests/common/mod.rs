//! Shared fixtures: an in-memory store plus a minimal auth gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use skillswap_core::{AppConfig, AppState, ChatEvent};
use skillswap_http::memory::MemoryNetwork;
use skillswap_http::types::Method;
use skillswap_http::{Result, StoreError, StoreNetwork, StoreRequest, StoreResponse, StreamEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Account {
    password: String,
    user_id: String,
    disabled: bool,
}

pub struct Backend {
    pub store: MemoryNetwork,
    accounts: Mutex<HashMap<String, Account>>,
    auth_calls: AtomicUsize,
    next_id: AtomicUsize,
    lost_posts: AtomicUsize,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            store: MemoryNetwork::new(),
            accounts: Mutex::new(HashMap::new()),
            auth_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
            lost_posts: AtomicUsize::new(0),
        })
    }

    pub fn add_account(&self, email: &str, password: &str, user_id: &str) {
        self.accounts.lock().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user_id: user_id.to_string(),
                disabled: false,
            },
        );
    }

    pub fn disable(&self, email: &str) {
        if let Some(account) = self.accounts.lock().get_mut(email) {
            account.disabled = true;
        }
    }

    /// Commit the next `times` POSTs, then drop their responses.
    pub fn lose_post_responses(&self, times: usize) {
        self.lost_posts.store(times, Ordering::SeqCst);
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    fn auth(&self, op: &str, request: &StoreRequest) -> StoreResponse {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let body = request.body_json().unwrap_or(Value::Null);
        let email = body["email"].as_str().unwrap_or_default().to_string();
        let password = body["password"].as_str().unwrap_or_default().to_string();
        let mut accounts = self.accounts.lock();

        let result = if op.starts_with("signUp") {
            if accounts.contains_key(&email) {
                Err("EMAIL_EXISTS")
            } else {
                let user_id = format!("uid-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
                accounts.insert(
                    email.clone(),
                    Account {
                        password,
                        user_id: user_id.clone(),
                        disabled: false,
                    },
                );
                Ok(user_id)
            }
        } else {
            match accounts.get(&email) {
                None => Err("EMAIL_NOT_FOUND"),
                Some(a) if a.disabled => Err("USER_DISABLED"),
                Some(a) if a.password != password => Err("INVALID_PASSWORD"),
                Some(a) => Ok(a.user_id.clone()),
            }
        };

        match result {
            Ok(user_id) => StoreResponse::ok_json(&json!({
                "localId": user_id,
                "email": email,
                "idToken": "id-token",
                "refreshToken": "refresh-token",
                "expiresIn": "3600"
            })),
            Err(message) => StoreResponse::new(
                400,
                json!({"error": {"code": 400, "message": message}}).to_string(),
            ),
        }
    }
}

#[async_trait]
impl StoreNetwork for Backend {
    async fn fetch(&self, url: &str, request: StoreRequest) -> Result<StoreResponse> {
        let method = request.method;
        let response = match url.split_once("accounts:") {
            Some((_, op)) => self.auth(op, &request),
            None => self.store.fetch(url, request).await?,
        };
        let lost = method == Method::Post
            && self
                .lost_posts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if lost {
            return Err(StoreError::Timeout);
        }
        Ok(response)
    }

    async fn subscribe(
        &self,
        url: &str,
        request: StoreRequest,
    ) -> Result<async_channel::Receiver<Result<StreamEvent>>> {
        self.store.subscribe(url, request).await
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig {
        database_url: "http://db.test".into(),
        auth_url: "http://auth.test/v1".into(),
        api_key: "test-key".into(),
        keep_alive_secs: None,
        ..Default::default()
    };
    config.client.max_retries = 0;
    config.client.retry_delay_ms = 1;
    config
}

pub fn app(backend: &Arc<Backend>) -> AppState {
    AppState::with_network(test_config(), backend.clone()).unwrap()
}

/// Like [`app`], but with the client's default retry count.
pub fn app_with_retries(backend: &Arc<Backend>) -> AppState {
    let mut config = test_config();
    config.client.max_retries = skillswap_http::client::ClientConfig::default().max_retries;
    AppState::with_network(config, backend.clone()).unwrap()
}

pub fn profile(name: &str, have: &[&str], learn: &[&str]) -> Value {
    json!({
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
        "location": "Lahore",
        "contact": "0300-0000000",
        "availability": "Weekends",
        "skillsHave": have,
        "skillsLearn": learn,
        "image": null
    })
}

/// Next event, failing the test if none arrives in time.
pub async fn next_event(events: &async_channel::Receiver<ChatEvent>) -> ChatEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for chat event")
        .expect("event channel closed")
}

/// Skip events until the next message list.
pub async fn next_messages(
    events: &async_channel::Receiver<ChatEvent>,
) -> Vec<skillswap_core::ChatMessage> {
    loop {
        if let ChatEvent::Messages(messages) = next_event(events).await {
            return messages;
        }
    }
}
