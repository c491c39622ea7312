//! Protocol constants for the document store's REST and streaming API.
//!
//! # Stream events
//!
//! | Event | Meaning |
//! |-------|---------|
//! | `put` | Data at `path` was replaced |
//! | `patch` | Children of `path` were merged |
//! | `keep-alive` | No-op, sent periodically |
//! | `cancel` | Server stopped the stream (rules changed) |
//! | `auth_revoked` | Credential expired; stream will close |

/// Media type requested for streaming reads.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Media type for request and response bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Suffix every resource path carries.
pub const JSON_SUFFIX: &str = ".json";

/// Default event name when the server omits one.
pub const DEFAULT_EVENT: &str = "message";

pub mod headers {
    pub const ACCEPT: &str = "Accept";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const RETRY_AFTER: &str = "retry-after";
    pub const CACHE_CONTROL: &str = "Cache-Control";
}

pub mod events {
    pub const PUT: &str = "put";
    pub const PATCH: &str = "patch";
    pub const KEEP_ALIVE: &str = "keep-alive";
    pub const CANCEL: &str = "cancel";
    pub const AUTH_REVOKED: &str = "auth_revoked";
}

pub mod status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const NOT_FOUND: u16 = 404;
    pub const TOO_MANY_REQUESTS: u16 = 429;
}
