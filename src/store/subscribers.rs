use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::ChatId;

use super::json::{load_or_default, save_atomic};

const SUBSCRIBED_AT: &str = "subscribed_at";

/// One record of the map-shaped registry. Every key other than `active`,
/// `subscribed_at` included, is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberEntry {
    pub active: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SubscriberEntry {
    fn default() -> Self {
        Self {
            active: true,
            extra: Map::new(),
        }
    }
}

impl SubscriberEntry {
    /// Missing `active` means active; an explicit `null` or `false` does not.
    fn from_object(mut object: Map<String, Value>) -> Self {
        let active = match object.remove("active") {
            None => true,
            Some(Value::Bool(active)) => active,
            Some(Value::Null) => false,
            Some(_) => true,
        };
        Self {
            active,
            extra: object,
        }
    }

    fn has_subscribed_at(&self) -> bool {
        self.extra
            .get(SUBSCRIBED_AT)
            .is_some_and(|value| !value.is_null())
    }

    fn mark_subscribed(&mut self, now: DateTime<Utc>) {
        if !self.has_subscribed_at() {
            self.extra
                .insert(SUBSCRIBED_AT.to_string(), Value::String(now.to_rfc3339()));
        }
    }
}

/// The two on-disk shapes of `subscribers.json`: `[111, 222]` or
/// `{"111": {"active": true}}`. Writes keep whichever shape was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubscriberFile {
    List(Vec<ChatId>),
    Map(BTreeMap<ChatId, SubscriberEntry>),
}

impl Default for SubscriberFile {
    fn default() -> Self {
        SubscriberFile::List(Vec::new())
    }
}

impl SubscriberFile {
    /// Interpret a raw document, skipping entries whose id is not an integer.
    /// Anything that is neither a list nor a map reads as an empty list.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(id) = chat_id_from_value(&item) {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
                SubscriberFile::List(ids)
            }
            Value::Object(map) => {
                let entries = map
                    .into_iter()
                    .filter_map(|(key, value)| {
                        let id = key.trim().parse::<ChatId>().ok()?;
                        Some((id, entry_from_value(value)))
                    })
                    .collect();
                SubscriberFile::Map(entries)
            }
            _ => SubscriberFile::default(),
        }
    }

    /// List entries are always active; map entries unless marked otherwise.
    pub fn active_ids(&self) -> BTreeSet<ChatId> {
        match self {
            SubscriberFile::List(ids) => ids.iter().copied().collect(),
            SubscriberFile::Map(entries) => entries
                .iter()
                .filter(|(_, entry)| entry.active)
                .map(|(id, _)| *id)
                .collect(),
        }
    }

    /// Returns whether the document changed.
    pub fn subscribe(&mut self, id: ChatId, now: DateTime<Utc>) -> bool {
        match self {
            SubscriberFile::List(ids) => {
                if ids.contains(&id) {
                    return false;
                }
                ids.push(id);
                true
            }
            SubscriberFile::Map(entries) => {
                let entry = entries.entry(id).or_insert_with(|| SubscriberEntry {
                    active: false,
                    ..SubscriberEntry::default()
                });
                let changed = !entry.active || !entry.has_subscribed_at();
                entry.active = true;
                entry.mark_subscribed(now);
                changed
            }
        }
    }

    /// Returns whether the document changed. Map records are kept, only deactivated.
    pub fn unsubscribe(&mut self, id: ChatId) -> bool {
        match self {
            SubscriberFile::List(ids) => {
                let before = ids.len();
                ids.retain(|existing| *existing != id);
                ids.len() != before
            }
            SubscriberFile::Map(entries) => match entries.get_mut(&id) {
                Some(entry) if entry.active => {
                    entry.active = false;
                    true
                }
                _ => false,
            },
        }
    }
}

fn chat_id_from_value(value: &Value) -> Option<ChatId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn entry_from_value(value: Value) -> SubscriberEntry {
    match value {
        Value::Object(object) => SubscriberEntry::from_object(object),
        _ => SubscriberEntry::default(),
    }
}

pub struct SubscriberRegistry {
    path: PathBuf,
}

impl SubscriberRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> SubscriberFile {
        SubscriberFile::from_value(load_or_default(&self.path, Value::Array(Vec::new())))
    }

    pub fn load_active_set(&self) -> BTreeSet<ChatId> {
        self.load().active_ids()
    }

    pub fn subscribe(&self, id: ChatId) -> Result<()> {
        let mut file = self.load();
        if file.subscribe(id, Utc::now()) {
            save_atomic(&self.path, &file)?;
            tracing::info!("Subscribed chat {}", id);
        }
        Ok(())
    }

    pub fn unsubscribe(&self, id: ChatId) -> Result<()> {
        let mut file = self.load();
        if file.unsubscribe(id) {
            save_atomic(&self.path, &file)?;
            tracing::info!("Unsubscribed chat {}", id);
        }
        Ok(())
    }
}
