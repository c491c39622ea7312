//! Incremental parser for `text/event-stream` bodies.

use crate::error::{Result, StoreError};
use crate::protocol::DEFAULT_EVENT;
use crate::types::StreamEvent;
use bytes::{Buf, BytesMut};

#[derive(Debug, Default)]
pub struct EventParser {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
}

impl EventParser {
    pub fn new() -> Self {
        EventParser {
            buffer: BytesMut::with_capacity(8192),
            ..Default::default()
        }
    }

    /// Last `id:` value seen, kept across events.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay the server asked for, if any.
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    /// Feed raw bytes; returns every event completed by them.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<StreamEvent>> {
        self.buffer.extend_from_slice(data);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line = self.buffer.split_to(pos);
            self.buffer.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            let line = std::str::from_utf8(&line)
                .map_err(|e| StoreError::EventParse(format!("Invalid UTF-8 in stream: {}", e)))?
                .to_string();

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else {
                self.process_line(&line);
            }
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry_ms = Some(ms);
                }
            }
            other => tracing::trace!("[SSE] Ignoring unknown field {:?}", other),
        }
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if id.is_some() {
            self.last_event_id = id.clone();
        }
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(StreamEvent {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id,
        })
    }
}
