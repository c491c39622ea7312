//! Follow Request & Relationship Module
//!
//! Loads a user's profile, the user directory, incoming follow requests and
//! both follow sets as five independent reads, and drives the request
//! lifecycle (send, accept). There is no reject or cancel path.

mod state;

pub use state::{
    filter_candidates, CandidateStatus, Notice, RelationshipState, Slice, SliceUpdate,
};

use crate::error::{Action, CoreError, Result};
use crate::models::{
    decode_collection, decode_record, now_timestamp, DirectoryEntry, FollowEdge, FollowRequest,
    UserProfile,
};
use crate::store;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use skillswap_http::{StoreClient, StoreError};
use tracing::{info, warn};

/// Steps of accepting a follow request, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptStep {
    AddFollowing,
    AddFollower,
    RemoveRequest,
}

/// Outcome of a load that did not fail outright.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub generation: u64,
    /// Slices whose read failed; they keep their previous value.
    pub failed: Vec<Slice>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Relationship state of one signed-in user, kept in sync with the store.
///
/// Mutations take `&mut self`, so at most one is in flight at a time.
pub struct RelationshipSync {
    store: StoreClient,
    user_id: String,
    state: RelationshipState,
    generation: u64,
    accept_attempts: u32,
}

impl RelationshipSync {
    pub fn new(store: StoreClient, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            state: RelationshipState::new(),
            generation: 0,
            accept_attempts: 3,
        }
    }

    pub fn with_accept_attempts(mut self, attempts: u32) -> Self {
        self.accept_attempts = attempts.max(1);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> &RelationshipState {
        &self.state
    }

    /// Apply an update produced outside `load_state`, e.g. by a caller that
    /// fetched a slice itself.
    pub fn apply(&mut self, generation: u64, update: SliceUpdate) -> bool {
        self.state.apply(generation, update)
    }

    /// Start a new load generation.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn candidates(&self, query: &str) -> Vec<&DirectoryEntry> {
        filter_candidates(&self.state, &self.user_id, query)
    }

    pub fn candidate_status(&self, id: &str) -> CandidateStatus {
        self.state.candidate_status(id)
    }

    pub fn followers_profiles(&self) -> Vec<&DirectoryEntry> {
        self.state.followers_profiles()
    }

    /// Read all five slices concurrently.
    ///
    /// Fails, leaving the state untouched, if the profile or directory read
    /// fails. Other failed reads are reported and their slices keep their
    /// previous value.
    pub async fn load_state(&mut self) -> Result<LoadReport> {
        let generation = self.next_generation();
        let user = self.user_id.as_str();

        let profile_path = store::user(user);
        let directory_path = store::users();
        let requests_path = store::follow_requests(user);
        let following_path = store::following(user);
        let followers_path = store::followers(user);

        let (profile, directory, requests, following, followers) = tokio::join!(
            self.fetch_optional::<Value>(&profile_path),
            self.fetch_optional::<Map<String, Value>>(&directory_path),
            self.fetch_optional::<Map<String, Value>>(&requests_path),
            self.fetch_optional::<Map<String, Value>>(&following_path),
            self.fetch_optional::<Map<String, Value>>(&followers_path),
        );

        let profile = profile.map_err(|e| {
            warn!("[Relationships] Profile read for {} failed: {}", self.user_id, e);
            CoreError::during(Action::LoadDashboard, e)
        })?;
        let directory = directory.map_err(|e| {
            warn!("[Relationships] Directory read failed: {}", e);
            CoreError::during(Action::LoadDashboard, e)
        })?;

        let profile: Option<UserProfile> =
            profile.and_then(|value| decode_record(store::USERS, &self.user_id, value));

        let mut notices = Vec::new();
        if profile.as_ref().and_then(|p| p.skills_learn.as_ref()).is_none() {
            notices.push(Notice::NoDesiredSkills);
        }
        if directory.is_none() {
            notices.push(Notice::NoUsersFound);
        }
        let directory: Vec<DirectoryEntry> =
            decode_collection::<UserProfile>(store::USERS, directory.unwrap_or_default())
                .into_iter()
                .map(|(id, profile)| DirectoryEntry { id, profile })
                .collect();

        let mut report = LoadReport {
            generation,
            failed: Vec::new(),
        };

        self.state.apply(generation, SliceUpdate::Profile(profile));
        self.state.apply(generation, SliceUpdate::Directory(directory));
        self.state.set_notices(notices);

        match requests {
            Ok(map) => {
                let requests = decode_collection::<FollowRequest>(
                    store::FOLLOW_REQUESTS,
                    map.unwrap_or_default(),
                )
                .into_iter()
                .map(|(id, mut request)| {
                    request.id = id;
                    request
                })
                .collect();
                self.state.apply(generation, SliceUpdate::Requests(requests));
            }
            Err(e) => self.slice_failed(&mut report, Slice::Requests, e),
        }

        match following {
            Ok(map) => {
                let ids = keys(map);
                self.state.apply(generation, SliceUpdate::Following(ids));
            }
            Err(e) => self.slice_failed(&mut report, Slice::Following, e),
        }

        match followers {
            Ok(map) => {
                let ids = keys(map);
                self.state.apply(generation, SliceUpdate::Followers(ids));
            }
            Err(e) => self.slice_failed(&mut report, Slice::Followers, e),
        }

        info!(
            "[Relationships] Loaded state for {} (generation {}, {} users, {} requests, {} failed)",
            self.user_id,
            generation,
            self.state.directory().len(),
            self.state.requests().len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> std::result::Result<Option<T>, StoreError> {
        self.store.get_json::<Option<T>>(path).await
    }

    fn slice_failed(&self, report: &mut LoadReport, slice: Slice, error: StoreError) {
        warn!(
            "[Relationships] {:?} read for {} failed, keeping previous value: {}",
            slice, self.user_id, error
        );
        report.failed.push(slice);
    }

    /// Ask `recipient` to connect. Refused locally, without a request, when a
    /// request is already pending or the two are already connected.
    pub async fn send_follow_request(&mut self, recipient: &str) -> Result<()> {
        if recipient == self.user_id {
            return Err(CoreError::Validation("You cannot follow yourself.".into()));
        }
        if self.state.is_connected(recipient) {
            return Err(CoreError::AlreadyConnected(recipient.to_string()));
        }
        if self.state.is_request_sent(recipient) {
            return Err(CoreError::RequestPending(recipient.to_string()));
        }
        let sender_name = self
            .state
            .profile()
            .map(|p| p.name.clone())
            .ok_or(CoreError::ProfileNotFound)?;

        let body = FollowRequest {
            id: self.user_id.clone(),
            sender_id: self.user_id.clone(),
            sender_name,
            timestamp: now_timestamp(),
        };
        self.store
            .put_json(&store::follow_request(recipient, &self.user_id), &body)
            .await
            .map_err(|e| {
                warn!(
                    "[Relationships] Follow request {} -> {} failed: {}",
                    self.user_id, recipient, e
                );
                CoreError::during(Action::SendFollowRequest, e)
            })?;

        self.state.mark_request_sent(recipient);
        info!(
            "[Relationships] Follow request sent from {} to {}",
            self.user_id, recipient
        );
        Ok(())
    }

    /// Accept the pending request from `sender`.
    ///
    /// Runs add-following, add-follower, remove-request. Every step is an
    /// overwrite or a delete, so the whole sequence is rerun from the start
    /// on a retryable failure, up to the configured number of attempts.
    /// When it reruns, its steps skip transport-level retries.
    pub async fn accept_follow_request(&mut self, sender: &str) -> Result<()> {
        let client = if self.accept_attempts > 1 {
            self.store.without_retries()
        } else {
            self.store.clone()
        };
        let mut attempt = 0;
        loop {
            attempt += 1;
            match accept_once(&client, &self.user_id, sender).await {
                Ok(()) => break,
                Err((step, e)) => {
                    let retry = attempt < self.accept_attempts && e.is_retryable();
                    warn!(
                        "[Relationships] Accepting {} failed at {:?} (attempt {}/{}): {}",
                        sender, step, attempt, self.accept_attempts, e
                    );
                    if !retry {
                        return Err(CoreError::AcceptFailed { step, source: e });
                    }
                }
            }
        }

        let generation = self.generation;
        let requests: Vec<FollowRequest> = self
            .state
            .requests()
            .iter()
            .filter(|r| r.id != sender)
            .cloned()
            .collect();
        let mut following: Vec<String> = self.state.following().iter().cloned().collect();
        if !following.iter().any(|id| id == sender) {
            following.push(sender.to_string());
        }
        self.state.apply(generation, SliceUpdate::Requests(requests));
        self.state.apply(generation, SliceUpdate::Following(following));

        info!(
            "[Relationships] Follow request from {} accepted by {}",
            sender, self.user_id
        );
        Ok(())
    }
}

async fn accept_once(
    client: &StoreClient,
    user_id: &str,
    sender: &str,
) -> std::result::Result<(), (AcceptStep, StoreError)> {
    let edge = FollowEdge {
        followed_at: now_timestamp(),
    };

    client
        .put_json(&store::following_edge(user_id, sender), &edge)
        .await
        .map_err(|e| (AcceptStep::AddFollowing, e))?;
    client
        .put_json(&store::follower_edge(sender, user_id), &edge)
        .await
        .map_err(|e| (AcceptStep::AddFollower, e))?;
    client
        .delete(&store::follow_request(user_id, sender))
        .await
        .map_err(|e| (AcceptStep::RemoveRequest, e))?;
    Ok(())
}

fn keys(map: Option<Map<String, Value>>) -> Vec<String> {
    map.map(|m| m.into_iter().map(|(k, _)| k).collect())
        .unwrap_or_default()
}

impl std::fmt::Debug for RelationshipSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipSync")
            .field("user_id", &self.user_id)
            .field("generation", &self.generation)
            .finish()
    }
}
