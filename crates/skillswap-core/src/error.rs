//! Error types for account, relationship and chat operations.

use crate::auth::AuthRejection;
use crate::relationships::AcceptStep;
use skillswap_http::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// What the user was doing when a store request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    SignUp,
    LoadDashboard,
    SendFollowRequest,
    AcceptFollowRequest,
    LoadMessages,
    SendMessage,
    Stream,
}

impl Action {
    pub fn user_message(&self) -> &'static str {
        match self {
            Action::Login => "Something went wrong. Please try again.",
            Action::SignUp => {
                "Something went wrong. Please try again or check your server configuration."
            }
            Action::LoadDashboard => "Failed to load data. Please try again.",
            Action::SendFollowRequest => "Failed to send follow request.",
            Action::AcceptFollowRequest => "Failed to accept follow request.",
            Action::LoadMessages => "Failed to load messages.",
            Action::SendMessage => "Failed to send message.",
            Action::Stream => "Connection error. Please try again.",
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{action:?} failed: {source}")]
    Request {
        action: Action,
        #[source]
        source: StoreError,
    },

    #[error("auth rejected: {0:?}")]
    Auth(AuthRejection),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user profile not found")]
    ProfileNotFound,

    #[error("message is empty")]
    EmptyMessage,

    #[error("already connected with {0}")]
    AlreadyConnected(String),

    #[error("follow request to {0} already pending")]
    RequestPending(String),

    #[error("accept failed at {step:?}: {source}")]
    AcceptFailed {
        step: AcceptStep,
        #[source]
        source: StoreError,
    },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("chat session closed")]
    SessionClosed,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn during(action: Action, source: StoreError) -> Self {
        CoreError::Request { action, source }
    }

    /// The string shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Store(_) => "Something went wrong. Please try again.".to_string(),
            CoreError::Request { action, .. } => action.user_message().to_string(),
            CoreError::Auth(rejection) => rejection.user_message(),
            CoreError::Validation(msg) => msg.clone(),
            CoreError::ProfileNotFound => "User profile not found in the database.".to_string(),
            CoreError::EmptyMessage => "Message cannot be empty.".to_string(),
            CoreError::AlreadyConnected(_) => "You are already connected with this user.".to_string(),
            CoreError::RequestPending(_) => "Follow request already sent.".to_string(),
            CoreError::AcceptFailed { .. } => Action::AcceptFollowRequest.user_message().to_string(),
            CoreError::MalformedPayload(_) => "Failed to process message.".to_string(),
            CoreError::SessionClosed => Action::Stream.user_message().to_string(),
            CoreError::Config(msg) => format!("Configuration error: {}", msg),
            CoreError::Io(_) => "Unexpected error occurred.".to_string(),
        }
    }
}
