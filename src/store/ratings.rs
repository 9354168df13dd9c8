use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::{ChatId, Rating};

use super::json::{load_or_default, save_atomic};

/// `{"<chat id>": {"<album identifier>": "bad|ok|super"}}`
pub type RatingsDocument = BTreeMap<String, BTreeMap<String, Rating>>;

pub struct RatingsStore {
    path: PathBuf,
}

impl RatingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> RatingsDocument {
        load_or_default(&self.path, RatingsDocument::new())
    }

    /// Last write wins; earlier ratings for the same album are not kept.
    pub fn set_rating(&self, user: ChatId, album_id: &str, rating: Rating) -> Result<()> {
        let mut ratings = self.load();
        ratings
            .entry(user.to_string())
            .or_default()
            .insert(album_id.to_string(), rating);
        save_atomic(&self.path, &ratings)?;
        tracing::debug!("Chat {} rated {} as {}", user, album_id, rating);
        Ok(())
    }

    pub fn ratings_for(&self, user: ChatId) -> BTreeMap<String, Rating> {
        self.load().remove(&user.to_string()).unwrap_or_default()
    }
}
