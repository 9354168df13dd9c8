use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::ChatId;

use super::chat::{ChatApi, InlineKeyboardMarkup};

/// Everything the bot tried to send, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message {
        chat_id: ChatId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    Photo {
        chat_id: ChatId,
        photo: PathBuf,
        caption: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    EditMarkup {
        chat_id: ChatId,
        message_id: i64,
        markup: InlineKeyboardMarkup,
    },
    Answer {
        callback_id: String,
        text: String,
    },
}

/// Recording `ChatApi`. Photos whose file does not exist fail, like the real upload.
#[derive(Default)]
pub struct FakeChat {
    sent: Mutex<Vec<Sent>>,
    fail_messages_to: Mutex<Vec<ChatId>>,
}

impl FakeChat {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_messages_to(&self, chat_id: ChatId) {
        self.fail_messages_to.lock().unwrap().push(chat_id);
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        if self.fail_messages_to.lock().unwrap().contains(&chat_id) {
            return Err(AppError::TelegramApi("Forbidden: bot was blocked".to_string()));
        }
        self.record(Sent::Message {
            chat_id,
            text: text.to_string(),
            markup: markup.cloned(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &Path,
        caption: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        std::fs::metadata(photo)?;
        self.record(Sent::Photo {
            chat_id,
            photo: photo.to_path_buf(),
            caption: caption.to_string(),
            markup: markup.cloned(),
        });
        Ok(())
    }

    async fn edit_reply_markup(
        &self,
        chat_id: ChatId,
        message_id: i64,
        markup: &InlineKeyboardMarkup,
    ) -> Result<()> {
        self.record(Sent::EditMarkup {
            chat_id,
            message_id,
            markup: markup.clone(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        self.record(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
