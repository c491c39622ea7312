//! Records as they are stored in the document store.
//!
//! Field names on the wire are camelCase with `ID` suffixes
//! (`senderID`, `skillsHave`). Keys of keyed collections are not part of
//! the record body; they are filled in from the enclosing map.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A user profile, stored at `Users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contact: String,
    /// National identity number
    #[serde(
        rename = "cnic",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub national_id: String,
    /// Free-text schedule
    #[serde(default, deserialize_with = "null_as_default")]
    pub availability: String,
    /// `None` when the record has no such field at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_have: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_learn: Option<Vec<String>>,
    /// URI or local path of the profile picture
    #[serde(default)]
    pub image: Option<String>,
}

impl UserProfile {
    pub fn skills_have(&self) -> &[String] {
        self.skills_have.as_deref().unwrap_or_default()
    }

    pub fn skills_learn(&self) -> &[String] {
        self.skills_learn.as_deref().unwrap_or_default()
    }

    /// Case-insensitive substring match against the offered skills.
    /// An empty query matches every profile that offers skills at all.
    pub fn offers_skill(&self, query: &str) -> bool {
        let Some(skills) = &self.skills_have else {
            return false;
        };
        let query = query.to_lowercase();
        query.is_empty() || skills.iter().any(|s| s.to_lowercase().contains(&query))
    }
}

/// One user of the directory (`Users`), with the key it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub id: String,
    pub profile: UserProfile,
}

/// A pending request, stored at `FollowRequests/{recipient}/{sender}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowRequest {
    /// The key the request is stored under, i.e. the sender's id.
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "senderID", default, deserialize_with = "null_as_default")]
    pub sender_id: String,
    #[serde(rename = "senderName", default, deserialize_with = "null_as_default")]
    pub sender_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

/// Body of a `FollowRelationships/{user}/{following|followers}/{other}` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub followed_at: String,
}

/// A chat message, stored under `Chats/{conversation}/messages/{key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Store-assigned key.
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "senderID", default, deserialize_with = "null_as_default")]
    pub sender_id: String,
    #[serde(rename = "recipientID", default, deserialize_with = "null_as_default")]
    pub recipient_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    /// ISO-8601 as written by the sender.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

/// Current time in the format clients write timestamps in.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Decode one record of a keyed collection. Records that do not decode are
/// logged and treated as absent.
pub fn decode_record<T: DeserializeOwned>(collection: &str, key: &str, value: Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("[Store] Skipping malformed record {}/{}: {}", collection, key, e);
            None
        }
    }
}

/// Decode every record of a keyed collection, pairing each with its key.
/// Keys come out in ascending order.
pub fn decode_collection<T: DeserializeOwned>(
    collection: &str,
    map: Map<String, Value>,
) -> Vec<(String, T)> {
    let mut entries: Vec<(String, T)> = map
        .into_iter()
        .filter_map(|(key, value)| {
            decode_record(collection, &key, value).map(|record| (key, record))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_tolerates_missing_and_null_fields() {
        let profile: UserProfile = serde_json::from_value(json!({
            "name": "Ana",
            "email": null,
            "skillsHave": ["Plumbing"],
            "image": null
        }))
        .unwrap();
        assert_eq!(profile.name, "Ana");
        assert_eq!(profile.email, "");
        assert_eq!(profile.skills_have(), ["Plumbing".to_string()]);
        assert!(profile.skills_learn.is_none());
        assert!(profile.image.is_none());
    }

    #[test]
    fn test_profile_wire_names() {
        let profile = UserProfile {
            name: "Ana".into(),
            national_id: "12345-1234567-1".into(),
            skills_have: Some(vec!["Cooking".into()]),
            skills_learn: Some(vec!["Guitar".into()]),
            ..Default::default()
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["cnic"], "12345-1234567-1");
        assert_eq!(value["skillsHave"], json!(["Cooking"]));
        assert_eq!(value["skillsLearn"], json!(["Guitar"]));
    }

    #[test]
    fn test_offers_skill_is_case_insensitive() {
        let profile = UserProfile {
            skills_have: Some(vec!["Plumbing".into()]),
            ..Default::default()
        };
        assert!(profile.offers_skill("plumb"));
        assert!(profile.offers_skill("PLUMB"));
        assert!(profile.offers_skill(""));
        assert!(!profile.offers_skill("guitar"));
        assert!(!UserProfile::default().offers_skill(""));
    }

    #[test]
    fn test_message_wire_names() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "senderID": "a",
            "recipientID": "b",
            "text": "hi",
            "timestamp": "2024-01-01T00:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(msg.sender_id, "a");
        assert_eq!(msg.recipient_id, "b");
        assert!(msg.id.is_empty());
    }

    #[test]
    fn test_decode_collection_skips_bad_records() {
        let map = json!({
            "u2": {"name": "Bo", "skillsHave": ["x"]},
            "u1": {"name": "Al"},
            "u3": {"skillsHave": "not a list"}
        });
        let Value::Object(map) = map else { unreachable!() };
        let entries: Vec<(String, UserProfile)> = decode_collection("Users", map);
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["u1", "u2"]);
    }

    #[test]
    fn test_timestamp_format() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
