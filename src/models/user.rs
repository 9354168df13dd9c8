use serde_json::{Map, Value};

use super::ChatId;

/// A stored profile from `users.json`. Kept as the raw JSON object so fields
/// this bot does not know about, or that hold unexpected types, survive upserts.
pub type UserProfile = Map<String, Value>;

/// What an inbound message tells us about its sender.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Unix timestamp of the interaction.
    pub seen_at: i64,
}

impl ProfileUpdate {
    /// Overwrite the fields this update knows about and leave the rest alone.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        profile.insert("id".to_string(), Value::from(self.chat_id));
        profile.insert("username".to_string(), Value::from(self.username.clone()));
        profile.insert("first_name".to_string(), Value::from(self.first_name.clone()));
        profile.insert("last_name".to_string(), Value::from(self.last_name.clone()));
        profile.insert("last_seen".to_string(), Value::from(self.seen_at));
    }
}
