mod chat;
#[cfg(test)]
pub mod fake;
mod telegram;

pub use chat::{ChatApi, InlineKeyboardButton, InlineKeyboardMarkup};
pub use telegram::{CallbackQuery, Message, TelegramClient, Update};
