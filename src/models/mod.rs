mod album;
mod rating;
mod user;

pub use album::{Album, AlbumLinks};
pub use rating::Rating;
pub use user::{ProfileUpdate, UserProfile};

/// Telegram chat identifier; private chats share the user's id.
pub type ChatId = i64;
