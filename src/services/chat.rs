use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ChatId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            callback_data: None,
        }
    }

    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            callback_data: Some(data.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    pub fn row(mut self, buttons: Vec<InlineKeyboardButton>) -> Self {
        self.inline_keyboard.push(buttons);
        self
    }
}

/// Outbound side of the chat platform. Text and captions are HTML.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &Path,
        caption: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    /// Replace the inline keyboard under an already sent message.
    async fn edit_reply_markup(
        &self,
        chat_id: ChatId,
        message_id: i64,
        markup: &InlineKeyboardMarkup,
    ) -> Result<()>;

    /// Ephemeral toast in reply to a button press.
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()>;
}
