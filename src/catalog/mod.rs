use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rand::seq::index;
use rand::Rng;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Album, Rating};
use crate::store::{load_or_default, save_atomic};

/// Telegram caps `callback_data` at 64 bytes and the longest payload is
/// `setrate|<id>|super`, which leaves this much for the identifier.
pub const MAX_IDENTIFIER_BYTES: usize = 50;

/// The read-only album catalog plus the global record of what was already sent.
pub struct Catalog {
    albums_path: PathBuf,
    sent_path: PathBuf,
    base_dir: PathBuf,
    default_cover: PathBuf,
}

/// One line of the `/list` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEntry {
    pub label: String,
    pub rating: Option<Rating>,
}

impl Catalog {
    pub fn new(
        albums_path: PathBuf,
        sent_path: PathBuf,
        base_dir: PathBuf,
        default_cover: PathBuf,
    ) -> Self {
        Self {
            albums_path,
            sent_path,
            base_dir,
            default_cover,
        }
    }

    /// Entries that do not look like albums are skipped rather than failing the load.
    pub fn load_albums(&self) -> Vec<Album> {
        match load_or_default(&self.albums_path, Value::Null) {
            Value::Array(items) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn load_sent(&self) -> BTreeSet<String> {
        match load_or_default(&self.sent_path, Value::Null) {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    pub fn save_sent(&self, sent: &BTreeSet<String>) -> Result<()> {
        // BTreeSet serializes as a sorted array
        save_atomic(&self.sent_path, sent)
    }

    pub fn pick_unsent_pair(&self) -> Result<Option<(Album, Album)>> {
        self.pick_unsent_pair_with(&mut rand::rng())
    }

    /// Pick two distinct unsent albums and mark them sent before anyone
    /// receives them. `None` means fewer than two remain.
    pub fn pick_unsent_pair_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Option<(Album, Album)>> {
        let mut sent = self.load_sent();
        // Entries sharing an identifier count once; the first one wins
        let mut seen = BTreeSet::new();
        let remaining: Vec<Album> = self
            .load_albums()
            .into_iter()
            .filter(|album| {
                let id = album.identifier();
                !sent.contains(&id) && seen.insert(id)
            })
            .collect();

        let Some((first, second)) = sample_pair(&remaining, rng) else {
            return Ok(None);
        };

        sent.insert(first.identifier());
        sent.insert(second.identifier());
        self.save_sent(&sent)?;

        Ok(Some((first, second)))
    }

    /// Identifiers too long to fit in a rating button's callback payload.
    pub fn oversized_identifiers(&self) -> Vec<String> {
        self.load_albums()
            .iter()
            .map(Album::identifier)
            .filter(|id| id.len() > MAX_IDENTIFIER_BYTES)
            .collect()
    }

    pub fn pick_random_pair(&self) -> Option<(Album, Album)> {
        self.pick_random_pair_with(&mut rand::rng())
    }

    /// Two distinct entries from the whole catalog; nothing is recorded.
    pub fn pick_random_pair_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(Album, Album)> {
        sample_pair(&self.load_albums(), rng)
    }

    /// The declared cover when it exists on disk, otherwise the default cover.
    pub fn resolve_cover(&self, album: &Album) -> PathBuf {
        if let Some(raw) = album.cover.as_deref().filter(|c| !c.is_empty()) {
            let path = Path::new(raw);
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.base_dir.join(path)
            };
            if path.exists() {
                return path;
            }
        }
        self.default_cover.clone()
    }

    /// Everything sent so far, joined against the catalog and the user's ratings.
    pub fn sent_listing(&self, ratings: &BTreeMap<String, Rating>) -> Vec<SentEntry> {
        let by_id: BTreeMap<String, Album> = self
            .load_albums()
            .into_iter()
            .map(|album| (album.identifier(), album))
            .collect();

        self.load_sent()
            .into_iter()
            .map(|id| SentEntry {
                label: by_id.get(&id).map(Album::label).unwrap_or_else(|| id.clone()),
                rating: ratings.get(&id).copied(),
            })
            .collect()
    }
}

fn sample_pair<R: Rng + ?Sized>(albums: &[Album], rng: &mut R) -> Option<(Album, Album)> {
    if albums.len() < 2 {
        return None;
    }
    let picked = index::sample(rng, albums.len(), 2);
    Some((albums[picked.index(0)].clone(), albums[picked.index(1)].clone()))
}
