//! Document store layout.
//!
//! ```text
//! Users/{user}
//! FollowRequests/{recipient}/{sender}
//! FollowRelationships/{user}/following/{other}
//! FollowRelationships/{user}/followers/{other}
//! Chats/{conversation}/messages/{key}
//! ```
//!
//! Every function returns an encoded path ready for `StoreClient`.

use skillswap_http::protocol::join_segments;

pub const USERS: &str = "Users";
pub const FOLLOW_REQUESTS: &str = "FollowRequests";
pub const FOLLOW_RELATIONSHIPS: &str = "FollowRelationships";
pub const CHATS: &str = "Chats";

pub fn users() -> String {
    USERS.to_string()
}

pub fn user(id: &str) -> String {
    join_segments([USERS, id])
}

/// Pending requests addressed to `recipient`.
pub fn follow_requests(recipient: &str) -> String {
    join_segments([FOLLOW_REQUESTS, recipient])
}

pub fn follow_request(recipient: &str, sender: &str) -> String {
    join_segments([FOLLOW_REQUESTS, recipient, sender])
}

pub fn following(user: &str) -> String {
    join_segments([FOLLOW_RELATIONSHIPS, user, "following"])
}

pub fn following_edge(user: &str, other: &str) -> String {
    join_segments([FOLLOW_RELATIONSHIPS, user, "following", other])
}

pub fn followers(user: &str) -> String {
    join_segments([FOLLOW_RELATIONSHIPS, user, "followers"])
}

pub fn follower_edge(user: &str, other: &str) -> String {
    join_segments([FOLLOW_RELATIONSHIPS, user, "followers", other])
}

pub fn chat_messages(conversation_id: &str) -> String {
    join_segments([CHATS, conversation_id, "messages"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(user("u1"), "Users/u1");
        assert_eq!(follow_request("bob", "ann"), "FollowRequests/bob/ann");
        assert_eq!(
            following_edge("bob", "ann"),
            "FollowRelationships/bob/following/ann"
        );
        assert_eq!(
            follower_edge("ann", "bob"),
            "FollowRelationships/ann/followers/bob"
        );
        assert_eq!(chat_messages("ann_bob"), "Chats/ann_bob/messages");
    }

    #[test]
    fn test_ids_are_encoded() {
        assert_eq!(user("a/b"), "Users/a%2Fb");
    }
}
