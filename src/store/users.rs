use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::Result;
use crate::models::{ChatId, ProfileUpdate, UserProfile};

use super::json::{load_or_default, save_atomic};

pub type UsersDocument = BTreeMap<String, UserProfile>;

pub struct UserDirectory {
    path: PathBuf,
}

impl UserDirectory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads the map form, or the older bare list of ids as empty profiles.
    /// Non-object profiles read as empty; list entries that are not ids are skipped.
    pub fn load(&self) -> UsersDocument {
        match load_or_default(&self.path, Value::Null) {
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| {
                    let profile = match value {
                        Value::Object(profile) => profile,
                        _ => UserProfile::new(),
                    };
                    (key, profile)
                })
                .collect(),
            Value::Array(ids) => ids
                .iter()
                .filter_map(legacy_id)
                .map(|id| (id.to_string(), UserProfile::new()))
                .collect(),
            _ => UsersDocument::new(),
        }
    }

    pub fn upsert(&self, update: &ProfileUpdate) -> Result<()> {
        let mut users = self.load();
        update.apply_to(users.entry(update.chat_id.to_string()).or_default());
        save_atomic(&self.path, &users)
    }
}

fn legacy_id(value: &Value) -> Option<ChatId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn update(chat_id: i64, username: Option<&str>, seen_at: i64) -> ProfileUpdate {
        ProfileUpdate {
            chat_id,
            username: username.map(str::to_string),
            first_name: Some("Ada".to_string()),
            last_name: None,
            seen_at,
        }
    }

    fn on_disk(path: &std::path::Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_upsert_creates_and_refreshes_profile() {
        let dir = tempfile::tempdir().unwrap();
        let users = UserDirectory::new(dir.path().join("users.json"));

        users.upsert(&update(5, Some("ada"), 100)).unwrap();
        users.upsert(&update(5, Some("ada_l"), 200)).unwrap();

        let doc = users.load();
        let profile = &doc["5"];
        assert_eq!(profile["id"], json!(5));
        assert_eq!(profile["username"], json!("ada_l"));
        assert_eq!(profile["last_seen"], json!(200));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_upsert_preserves_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, r#"{"5": {"id": 5, "lang": "de"}}"#).unwrap();
        let users = UserDirectory::new(path.clone());

        users.upsert(&update(5, None, 300)).unwrap();

        let doc = on_disk(&path);
        assert_eq!(doc["5"]["lang"], json!("de"));
        assert_eq!(doc["5"]["last_seen"], json!(300));
        assert_eq!(doc["5"]["username"], Value::Null);
    }

    #[test]
    fn test_oddly_typed_field_does_not_wipe_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(
            &path,
            r#"{"5": {"id": 5, "lang": "de", "last_seen": 1700000000.5}, "6": {"id": "six", "note": "x"}}"#,
        )
        .unwrap();
        let users = UserDirectory::new(path.clone());

        users.upsert(&update(5, Some("ada"), 1)).unwrap();

        let doc = on_disk(&path);
        assert_eq!(doc["5"]["lang"], json!("de"));
        assert_eq!(doc["5"]["last_seen"], json!(1));
        // Untouched profiles are written back as they were
        assert_eq!(doc["6"], json!({"id": "six", "note": "x"}));
    }

    #[test]
    fn test_legacy_list_reads_as_empty_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, r#"[11, "12", null, {"id": 13}, "abc"]"#).unwrap();
        let doc = UserDirectory::new(path).load();
        assert_eq!(doc.keys().cloned().collect::<Vec<_>>(), vec!["11", "12"]);
        assert!(doc["11"].is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let users = UserDirectory::new(dir.path().join("users.json"));
        let mut doc = UsersDocument::new();
        let mut profile = UserProfile::new();
        update(9, Some("nine"), 42).apply_to(&mut profile);
        doc.insert("9".to_string(), profile);

        save_atomic(&users.path, &doc).unwrap();
        assert_eq!(users.load(), doc);
    }
}
