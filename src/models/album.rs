use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Direct storefront links; any of them may be missing or empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumLinks {
    #[serde(default)]
    pub spotify: Option<String>,
    #[serde(default)]
    pub apple: Option<String>,
    #[serde(default)]
    pub youtube: Option<String>,
}

/// A catalog entry from `albums.final.json`. The bot never mutates these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub key: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default, rename = "album")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub links: Option<AlbumLinks>,
}

impl Album {
    /// Stable identifier used for dedup, ratings and callback payloads.
    ///
    /// Precedence is `id`, then a non-empty `key`, then `"<artist>__<title>"`.
    /// Entries that share an identifier are indistinguishable to the bot.
    pub fn identifier(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        if let Some(key) = self.key.as_deref().filter(|k| !k.is_empty()) {
            return key.to_string();
        }
        format!(
            "{}__{}",
            self.artist.as_deref().unwrap_or("").trim(),
            self.title.as_deref().unwrap_or("").trim()
        )
    }

    pub fn artist_or_unknown(&self) -> &str {
        non_empty(self.artist.as_deref()).unwrap_or("Unknown Artist")
    }

    pub fn title_or_unknown(&self) -> &str {
        non_empty(self.title.as_deref()).unwrap_or("Unknown Album")
    }

    pub fn year(&self) -> Option<&str> {
        non_empty(self.year.as_deref())
    }

    /// "Artist — Title" with whatever the catalog has, used by `/list`.
    pub fn label(&self) -> String {
        format!(
            "{} — {}",
            self.artist.as_deref().unwrap_or(""),
            self.title.as_deref().unwrap_or("")
        )
    }

    /// Free-text query for storefront search pages.
    pub fn search_query(&self) -> String {
        format!(
            "{} {}",
            self.artist.as_deref().unwrap_or(""),
            self.title.as_deref().unwrap_or("")
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Catalog ingestion writes ids and years as either strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
