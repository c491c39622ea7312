//! SkillSwap: match people by the skills they offer and want to learn.
//!
//! All state lives in a remote path-addressed JSON store and an email/password
//! auth gateway; this crate keeps local views of it in sync.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod relationships;
pub mod store;

pub use auth::{Accounts, AuthGateway, AuthRejection, AuthSession, Session, SignUpForm};
pub use chat::{conversation_id, ChatEvent, ChatSession, ChatState, ChatView};
pub use config::AppConfig;
pub use error::{Action, CoreError, Result};
pub use models::{ChatMessage, DirectoryEntry, FollowEdge, FollowRequest, UserProfile};
pub use relationships::{
    filter_candidates, AcceptStep, CandidateStatus, LoadReport, Notice, RelationshipState,
    RelationshipSync, Slice, SliceUpdate,
};

use skillswap_http::client::{KeepAliveConfig, NativeNetwork};
use skillswap_http::{StoreClient, StoreNetwork};
use std::sync::Arc;

/// Clients shared by every screen.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: StoreClient,
    pub auth: AuthGateway,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let network = Arc::new(NativeNetwork::from_config(&config.client)?);
        Self::with_network(config, network)
    }

    /// Use a custom network, e.g. an in-memory store for tests.
    pub fn with_network(config: AppConfig, network: Arc<dyn StoreNetwork>) -> Result<Self> {
        config.validate()?;
        let store =
            StoreClient::with_network(&config.database_url, network, config.client.clone())?;
        let auth = AuthGateway::new(store.clone(), &config.auth_url, &config.api_key);
        Ok(Self {
            config,
            store,
            auth,
        })
    }

    pub fn accounts(&self) -> Accounts {
        Accounts::new(self.store.clone(), self.auth.clone())
    }

    pub fn relationships(&self, user_id: &str) -> RelationshipSync {
        RelationshipSync::new(self.store.clone(), user_id)
            .with_accept_attempts(self.config.accept_attempts)
    }

    /// A conversation between `self_id` and `peer_id`, not yet connected.
    pub fn chat(&self, self_id: &str, peer_id: &str) -> ChatSession {
        let session = ChatSession::new(self.store.clone(), self_id, peer_id);
        match self.config.keep_alive_secs {
            Some(secs) => session.with_keep_alive(KeepAliveConfig::new(secs)),
            None => session,
        }
    }
}
