use std::path::Path;

use url::form_urlencoded;

use crate::error::Result;
use crate::models::{Album, AlbumLinks, ChatId, Rating};
use crate::services::{ChatApi, InlineKeyboardButton, InlineKeyboardMarkup};

pub const RATE_PREFIX: &str = "rate";
pub const SET_RATE_PREFIX: &str = "setrate";

/// `🎵 <b>Artist — Title</b> <i>(1971)</i>`
pub fn build_caption(album: &Album) -> String {
    let mut line = format!(
        "🎵 <b>{} — {}</b>",
        escape_html(album.artist_or_unknown()),
        escape_html(album.title_or_unknown())
    );
    if let Some(year) = album.year() {
        line.push_str(&format!(" <i>({})</i>", escape_html(year)));
    }
    line
}

/// Three storefront links (direct when the catalog has them, search otherwise)
/// and a button that opens the rating choices.
pub fn build_keyboard(album: &Album) -> InlineKeyboardMarkup {
    let query: String = form_urlencoded::byte_serialize(album.search_query().as_bytes()).collect();
    let links: AlbumLinks = album.links.clone().unwrap_or_default();

    let spotify = non_empty(links.spotify)
        .unwrap_or_else(|| format!("https://open.spotify.com/search/{}", query));
    let apple = non_empty(links.apple)
        .unwrap_or_else(|| format!("https://music.apple.com/search?term={}", query));
    let youtube = non_empty(links.youtube)
        .unwrap_or_else(|| format!("https://music.youtube.com/search?q={}", query));

    InlineKeyboardMarkup::default()
        .row(vec![
            InlineKeyboardButton::url("Spotify", spotify),
            InlineKeyboardButton::url("Apple Music", apple),
            InlineKeyboardButton::url("YouTube Music", youtube),
        ])
        .row(vec![InlineKeyboardButton::callback(
            "🎧 Rate",
            format!("{}|{}", RATE_PREFIX, album.identifier()),
        )])
}

/// The second step of rating: one button per choice, each carrying the album id.
pub fn rating_keyboard(album_id: &str) -> InlineKeyboardMarkup {
    let buttons = Rating::ALL
        .iter()
        .map(|rating| {
            InlineKeyboardButton::callback(
                rating.label(),
                format!("{}|{}|{}", SET_RATE_PREFIX, album_id, rating.as_str()),
            )
        })
        .collect();
    InlineKeyboardMarkup::default().row(buttons)
}

/// Send the cover with caption and keyboard; if that fails for any reason,
/// send the caption as a plain message instead. No further retries.
pub async fn send_album(
    chat: &dyn ChatApi,
    user_id: ChatId,
    album: &Album,
    cover: &Path,
) -> Result<()> {
    let caption = build_caption(album);
    let markup = build_keyboard(album);

    match chat.send_photo(user_id, cover, &caption, Some(&markup)).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(
                "Cover upload to {} failed ({}), sending text for {}",
                user_id,
                e,
                album.identifier()
            );
            chat.send_message(user_id, &caption, Some(&markup)).await
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
