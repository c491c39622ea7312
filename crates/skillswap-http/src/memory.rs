//! In-memory document store for tests.
//!
//! Models the store as a single JSON tree addressed by slash-separated
//! paths. Writing `null` deletes, and objects left empty by a delete are
//! pruned, so an absent path always reads back as `null`.

use crate::error::{Result, StoreError};
use crate::protocol::{events, JSON_SUFFIX};
use crate::traits::StoreNetwork;
use crate::types::{Method, StoreRequest, StoreResponse, StreamEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Failure {
    Status(u16),
    Transport,
}

#[derive(Debug)]
struct InjectedFailure {
    method: Method,
    path: String,
    failure: Failure,
    remaining: usize,
}

type StreamSender = async_channel::Sender<Result<StreamEvent>>;

#[derive(Default)]
struct Inner {
    root: Value,
    failures: Vec<InjectedFailure>,
    counts: HashMap<(Method, String), usize>,
    log: Vec<(Method, String)>,
    streams: Vec<(String, StreamSender)>,
    next_push_id: u64,
}

#[derive(Default)]
pub struct MemoryNetwork {
    inner: Mutex<Inner>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tree, e.g. `seed("Users/u1", json!({...}))`.
    pub fn seed(&self, path: &str, value: Value) {
        let mut inner = self.inner.lock();
        set_at(&mut inner.root, &segments(path), value);
    }

    /// Current value at `path` (`null` if absent).
    pub fn value(&self, path: &str) -> Value {
        let inner = self.inner.lock();
        get_at(&inner.root, &segments(path)).clone()
    }

    /// Answer the next `times` requests matching `method` and `path` with `status`.
    pub fn fail_next(&self, method: Method, path: &str, status: u16, times: usize) {
        self.inner.lock().failures.push(InjectedFailure {
            method,
            path: normalize(path),
            failure: Failure::Status(status),
            remaining: times,
        });
    }

    /// Fail the next `times` matching requests at the transport level.
    pub fn fail_transport(&self, method: Method, path: &str, times: usize) {
        self.inner.lock().failures.push(InjectedFailure {
            method,
            path: normalize(path),
            failure: Failure::Transport,
            remaining: times,
        });
    }

    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.inner
            .lock()
            .counts
            .get(&(method, normalize(path)))
            .copied()
            .unwrap_or(0)
    }

    /// Every request seen, in order.
    pub fn request_log(&self) -> Vec<(Method, String)> {
        self.inner.lock().log.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.inner
            .lock()
            .log
            .iter()
            .filter(|(m, _)| m.is_mutation())
            .count()
    }

    /// Number of streams whose consumer is still attached.
    pub fn open_streams(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.streams.retain(|(_, tx)| !tx.is_closed());
        inner.streams.len()
    }

    /// Send a raw event to every stream on `path`.
    pub fn push_event(&self, path: &str, event: StreamEvent) {
        let path = normalize(path);
        let inner = self.inner.lock();
        for (stream_path, tx) in &inner.streams {
            if *stream_path == path {
                let _ = tx.try_send(Ok(event.clone()));
            }
        }
    }

    /// Send a transport error to every stream on `path`.
    pub fn push_error(&self, path: &str, error: StoreError) {
        let path = normalize(path);
        let message = error.to_string();
        let inner = self.inner.lock();
        for (stream_path, tx) in &inner.streams {
            if *stream_path == path {
                let _ = tx.try_send(Err(StoreError::Http(message.clone())));
            }
        }
    }

    /// End every open stream, as a dropped connection would.
    pub fn close_streams(&self) {
        let mut inner = self.inner.lock();
        for (_, tx) in inner.streams.drain(..) {
            tx.close();
        }
    }

    fn record(inner: &mut Inner, method: Method, path: &str) -> Option<Failure> {
        *inner
            .counts
            .entry((method, path.to_string()))
            .or_insert(0) += 1;
        inner.log.push((method, path.to_string()));

        let failure = inner
            .failures
            .iter_mut()
            .find(|f| f.method == method && f.path == path && f.remaining > 0)?;
        failure.remaining -= 1;
        Some(failure.failure.clone())
    }

    fn notify(inner: &mut Inner, changed: &str) {
        inner.streams.retain(|(_, tx)| !tx.is_closed());
        for (stream_path, tx) in &inner.streams {
            let related = changed.starts_with(stream_path.as_str())
                || stream_path.starts_with(changed)
                || stream_path.is_empty();
            if related {
                let data = get_at(&inner.root, &segments(stream_path)).clone();
                let _ = tx.try_send(Ok(put_event(data)));
            }
        }
    }
}

fn put_event(data: Value) -> StreamEvent {
    StreamEvent::new(events::PUT, json!({"path": "/", "data": data}).to_string())
}

fn path_from_url(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|e| StoreError::Config(e.to_string()))?;
    let path = parsed.path();
    let path = path.strip_suffix(JSON_SUFFIX).unwrap_or(path);
    let decoded: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            percent_encoding::percent_decode_str(s)
                .decode_utf8_lossy()
                .into_owned()
        })
        .collect();
    Ok(decoded.join("/"))
}

fn normalize(path: &str) -> String {
    segments(path).join("/")
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_at<'a>(root: &'a Value, path: &[String]) -> &'a Value {
    let mut current = root;
    for segment in path {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &Value::Null,
        }
    }
    current
}

fn set_at(root: &mut Value, path: &[String], value: Value) {
    if path.is_empty() {
        *root = value;
        return;
    }

    if value.is_null() {
        remove_at(root, path);
        return;
    }

    let mut current = root;
    for segment in path {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map.entry(segment.clone()).or_insert(Value::Null);
    }
    *current = value;
}

/// Remove the value at `path`, pruning parents left empty. Returns true if the
/// node at this level became empty.
fn remove_at(node: &mut Value, path: &[String]) -> bool {
    let Some((first, rest)) = path.split_first() else {
        return true;
    };
    let Some(obj) = node.as_object_mut() else {
        return false;
    };
    let remove_child = match obj.get_mut(first) {
        Some(child) if rest.is_empty() => {
            *child = Value::Null;
            true
        }
        Some(child) => remove_at(child, rest),
        None => false,
    };
    if remove_child {
        obj.remove(first);
    }
    obj.is_empty()
}

#[async_trait]
impl StoreNetwork for MemoryNetwork {
    async fn fetch(&self, url: &str, request: StoreRequest) -> Result<StoreResponse> {
        let path = path_from_url(url)?;
        let mut inner = self.inner.lock();

        match Self::record(&mut inner, request.method, &path) {
            Some(Failure::Status(status)) => {
                return Ok(StoreResponse::new(
                    status,
                    json!({"error": format!("injected {}", status)}).to_string(),
                ));
            }
            Some(Failure::Transport) => {
                return Err(StoreError::Http(format!("connection reset: {}", url)));
            }
            None => {}
        }

        let segs = segments(&path);
        let response = match request.method {
            Method::Get => StoreResponse::ok_json(get_at(&inner.root, &segs)),
            Method::Put => {
                let value = request.body_json()?;
                set_at(&mut inner.root, &segs, value.clone());
                Self::notify(&mut inner, &path);
                StoreResponse::ok_json(&value)
            }
            Method::Patch => {
                let value = request.body_json()?;
                let Value::Object(fields) = value.clone() else {
                    return Ok(StoreResponse::new(
                        400,
                        json!({"error": "Invalid data; couldn't parse JSON object"}).to_string(),
                    ));
                };
                for (key, child) in fields {
                    let mut child_path = segs.clone();
                    child_path.push(key);
                    set_at(&mut inner.root, &child_path, child);
                }
                Self::notify(&mut inner, &path);
                StoreResponse::ok_json(&value)
            }
            Method::Post => {
                let value = request.body_json()?;
                inner.next_push_id += 1;
                let key = format!("-N{:016x}", inner.next_push_id);
                let mut child_path = segs.clone();
                child_path.push(key.clone());
                set_at(&mut inner.root, &child_path, value);
                Self::notify(&mut inner, &path);
                StoreResponse::ok_json(&json!({ "name": key }))
            }
            Method::Delete => {
                set_at(&mut inner.root, &segs, Value::Null);
                Self::notify(&mut inner, &path);
                StoreResponse::ok_json(&Value::Null)
            }
        };
        Ok(response)
    }

    async fn subscribe(
        &self,
        url: &str,
        _request: StoreRequest,
    ) -> Result<async_channel::Receiver<Result<StreamEvent>>> {
        let path = path_from_url(url)?;
        let mut inner = self.inner.lock();

        match Self::record(&mut inner, Method::Get, &path) {
            Some(Failure::Status(status)) => {
                return Err(StoreError::Status {
                    status,
                    body: format!("injected {}", status),
                });
            }
            Some(Failure::Transport) => {
                return Err(StoreError::Http(format!("connection refused: {}", url)));
            }
            None => {}
        }

        let (tx, rx) = async_channel::unbounded();
        let initial = get_at(&inner.root, &segments(&path)).clone();
        let _ = tx.try_send(Ok(put_event(initial)));
        inner.streams.push((path, tx));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> String {
        format!("http://mem.test/{}.json", path)
    }

    #[tokio::test]
    async fn test_delete_prunes_empty_parents() {
        let net = MemoryNetwork::new();
        net.seed("FollowRequests/u1/u2", json!({"senderID": "u2"}));
        net.fetch(&url("FollowRequests/u1/u2"), StoreRequest::delete())
            .await
            .unwrap();
        assert!(net.value("FollowRequests/u1").is_null());
        assert!(net.value("FollowRequests").is_null());
    }

    #[tokio::test]
    async fn test_post_returns_push_key() {
        let net = MemoryNetwork::new();
        let req = StoreRequest::json(Method::Post, &json!({"text": "hi"})).unwrap();
        let res = net.fetch(&url("Chats/a_b/messages"), req).await.unwrap();
        let key = res.json::<Value>().unwrap()["name"].as_str().unwrap().to_string();
        assert_eq!(net.value(&format!("Chats/a_b/messages/{}/text", key)), json!("hi"));
    }

    #[tokio::test]
    async fn test_subscribe_gets_initial_and_updates() {
        let net = MemoryNetwork::new();
        let rx = net
            .subscribe(&url("Chats/a_b/messages"), StoreRequest::get().stream())
            .await
            .unwrap();
        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.event, "put");
        assert!(first.data_json::<Value>().unwrap()["data"].is_null());

        let req = StoreRequest::json(Method::Post, &json!({"text": "hi"})).unwrap();
        net.fetch(&url("Chats/a_b/messages"), req).await.unwrap();
        let second = rx.recv().await.unwrap().unwrap();
        let data = second.data_json::<Value>().unwrap();
        assert_eq!(data["data"].as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_percent_encoded_paths_decode() {
        let net = MemoryNetwork::new();
        net.seed("Users/a b", json!({"name": "x"}));
        let res = net
            .fetch("http://mem.test/Users/a%20b.json", StoreRequest::get())
            .await
            .unwrap();
        assert_eq!(res.json::<Value>().unwrap()["name"], "x");
    }
}
