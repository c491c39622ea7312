//! A single server-sent event.

use serde::de::DeserializeOwned;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamEvent {
    /// Event name; `message` when the server sent none.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl StreamEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        StreamEvent {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.event == name
    }

    pub fn data_json<T: DeserializeOwned>(&self) -> crate::error::Result<T> {
        Ok(serde_json::from_str(&self.data)?)
    }
}
