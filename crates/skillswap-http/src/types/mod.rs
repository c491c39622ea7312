pub mod event;
pub mod request;
pub mod response;

pub use event::StreamEvent;
pub use request::{Method, StoreRequest};
pub use response::StoreResponse;
