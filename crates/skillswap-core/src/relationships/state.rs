//! Read-side aggregate of one user's relationships.

use crate::models::{DirectoryEntry, FollowRequest, UserProfile};
use std::collections::{BTreeSet, HashMap};

/// Independently loaded parts of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    Profile,
    Directory,
    Requests,
    Following,
    Followers,
}

/// A new value for exactly one slice.
#[derive(Debug, Clone)]
pub enum SliceUpdate {
    Profile(Option<UserProfile>),
    Directory(Vec<DirectoryEntry>),
    Requests(Vec<FollowRequest>),
    Following(Vec<String>),
    Followers(Vec<String>),
}

impl SliceUpdate {
    pub fn slice(&self) -> Slice {
        match self {
            SliceUpdate::Profile(_) => Slice::Profile,
            SliceUpdate::Directory(_) => Slice::Directory,
            SliceUpdate::Requests(_) => Slice::Requests,
            SliceUpdate::Following(_) => Slice::Following,
            SliceUpdate::Followers(_) => Slice::Followers,
        }
    }
}

/// Non-error conditions worth telling the user about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    NoDesiredSkills,
    NoUsersFound,
}

impl Notice {
    pub fn user_message(&self) -> &'static str {
        match self {
            Notice::NoDesiredSkills => "No desired skills found for this user.",
            Notice::NoUsersFound => "No users found in the database.",
        }
    }
}

/// What the follow button for a candidate should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStatus {
    Follow,
    RequestSent,
    Following,
}

#[derive(Debug, Default, Clone)]
pub struct RelationshipState {
    profile: Option<UserProfile>,
    directory: Vec<DirectoryEntry>,
    requests: Vec<FollowRequest>,
    following: BTreeSet<String>,
    followers: BTreeSet<String>,
    request_sent: BTreeSet<String>,
    notices: Vec<Notice>,
    applied: HashMap<Slice, u64>,
}

impl RelationshipState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one slice. Updates produced by a load older than the one that
    /// last wrote this slice are discarded; returns whether it was applied.
    pub fn apply(&mut self, generation: u64, update: SliceUpdate) -> bool {
        let slice = update.slice();
        if self.applied.get(&slice).is_some_and(|last| generation < *last) {
            tracing::debug!(
                "[Relationships] Discarding stale {:?} update (generation {})",
                slice,
                generation
            );
            return false;
        }
        self.applied.insert(slice, generation);

        match update {
            SliceUpdate::Profile(profile) => self.profile = profile,
            SliceUpdate::Directory(directory) => self.directory = directory,
            SliceUpdate::Requests(requests) => self.requests = requests,
            SliceUpdate::Following(following) => {
                self.following = following.into_iter().collect();
                let following = &self.following;
                self.request_sent.retain(|id| !following.contains(id));
            }
            SliceUpdate::Followers(followers) => {
                self.followers = followers.into_iter().collect();
            }
        }
        true
    }

    pub fn generation_of(&self, slice: Slice) -> Option<u64> {
        self.applied.get(&slice).copied()
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn directory(&self) -> &[DirectoryEntry] {
        &self.directory
    }

    pub fn requests(&self) -> &[FollowRequest] {
        &self.requests
    }

    pub fn following(&self) -> &BTreeSet<String> {
        &self.following
    }

    pub fn followers(&self) -> &BTreeSet<String> {
        &self.followers
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub(crate) fn set_notices(&mut self, notices: Vec<Notice>) {
        self.notices = notices;
    }

    pub(crate) fn mark_request_sent(&mut self, id: &str) {
        if !self.following.contains(id) {
            self.request_sent.insert(id.to_string());
        }
    }

    pub fn is_request_sent(&self, id: &str) -> bool {
        self.request_sent.contains(id)
    }

    /// Connected in either direction.
    pub fn is_connected(&self, id: &str) -> bool {
        self.following.contains(id) || self.followers.contains(id)
    }

    pub fn candidate_status(&self, id: &str) -> CandidateStatus {
        if self.following.contains(id) {
            CandidateStatus::Following
        } else if self.request_sent.contains(id) {
            CandidateStatus::RequestSent
        } else {
            CandidateStatus::Follow
        }
    }

    /// Directory entries of everyone following this user.
    pub fn followers_profiles(&self) -> Vec<&DirectoryEntry> {
        self.directory
            .iter()
            .filter(|entry| self.followers.contains(&entry.id))
            .collect()
    }
}

/// Users to offer as matches for `query`: everyone in the directory who
/// offers a skill containing `query` as typed (case-insensitive), except `self_id`
/// and current followers. Users without `skillsHave` never match.
pub fn filter_candidates<'a>(
    state: &'a RelationshipState,
    self_id: &str,
    query: &str,
) -> Vec<&'a DirectoryEntry> {
    state
        .directory
        .iter()
        .filter(|entry| entry.id != self_id && !state.followers.contains(&entry.id))
        .filter(|entry| entry.profile.offers_skill(query))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, skills: Option<&[&str]>) -> DirectoryEntry {
        DirectoryEntry {
            id: id.to_string(),
            profile: UserProfile {
                name: id.to_uppercase(),
                skills_have: skills.map(|s| s.iter().map(|x| x.to_string()).collect()),
                ..Default::default()
            },
        }
    }

    fn ids(entries: &[&DirectoryEntry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    fn state() -> RelationshipState {
        let mut state = RelationshipState::new();
        state.apply(
            1,
            SliceUpdate::Directory(vec![
                entry("me", Some(&["Plumbing"])),
                entry("ann", Some(&["Plumbing", "Cooking"])),
                entry("bob", Some(&["Guitar"])),
                entry("cat", None),
                entry("dan", Some(&["plumbing basics"])),
            ]),
        );
        state.apply(1, SliceUpdate::Followers(vec!["dan".into()]));
        state
    }

    #[test]
    fn test_excludes_self_followers_and_skillless() {
        let state = state();
        assert_eq!(ids(&filter_candidates(&state, "me", "")), ["ann", "bob"]);
    }

    #[test]
    fn test_query_is_case_insensitive_substring() {
        let state = state();
        assert_eq!(ids(&filter_candidates(&state, "me", "plumb")), ["ann"]);
        assert_eq!(ids(&filter_candidates(&state, "me", "PLUMB")), ["ann"]);
        assert_eq!(ids(&filter_candidates(&state, "me", "ook")), ["ann"]);
        assert!(filter_candidates(&state, "me", "welding").is_empty());
    }

    #[test]
    fn test_query_is_matched_as_typed() {
        let state = state();
        assert!(filter_candidates(&state, "me", "plumb ").is_empty());
        assert!(filter_candidates(&state, "me", "  ").is_empty());
    }

    #[test]
    fn test_stale_update_is_discarded() {
        let mut state = state();
        assert!(state.apply(3, SliceUpdate::Following(vec!["ann".into()])));
        assert!(!state.apply(2, SliceUpdate::Following(vec![])));
        assert!(state.following().contains("ann"));
        // Other slices keep their own generation.
        assert!(state.apply(2, SliceUpdate::Followers(vec![])));
        assert_eq!(state.generation_of(Slice::Following), Some(3));
    }

    #[test]
    fn test_following_clears_request_sent() {
        let mut state = state();
        state.mark_request_sent("bob");
        assert_eq!(state.candidate_status("bob"), CandidateStatus::RequestSent);

        state.apply(2, SliceUpdate::Following(vec!["bob".into()]));
        assert!(!state.is_request_sent("bob"));
        assert_eq!(state.candidate_status("bob"), CandidateStatus::Following);
        assert_eq!(state.candidate_status("ann"), CandidateStatus::Follow);
    }

    #[test]
    fn test_followers_profiles() {
        let state = state();
        assert_eq!(ids(&state.followers_profiles()), ["dan"]);
    }
}
