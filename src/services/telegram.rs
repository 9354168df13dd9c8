use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ChatId;

use super::chat::{ChatApi, InlineKeyboardMarkup};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const PARSE_MODE: &str = "HTML";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub date: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditReplyMarkupRequest<'a> {
    chat_id: ChatId,
    message_id: i64,
    reply_markup: &'a InlineKeyboardMarkup,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u32,
    allowed_updates: [&'static str; 2],
}

/// Minimal Bot API client: just the calls the bot makes.
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    /// `poll_timeout_secs` is the long-poll window; requests may take that long.
    pub fn new(token: String, poll_timeout_secs: u32) -> Result<Self> {
        Self::with_api_url(token, poll_timeout_secs, TELEGRAM_API_URL)
    }

    /// Same as `new`, against another Bot API server (self-hosted or local).
    pub fn with_api_url(token: String, poll_timeout_secs: u32, api_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(poll_timeout_secs) + 30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("album-bot/1.0")
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(params)
            .send()
            .await?;
        Self::read_response(method, response).await
    }

    async fn read_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body: ApiResponse<T> = response.json().await?;

        if !body.ok {
            let description = body
                .description
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(AppError::TelegramApi(format!("{}: {}", method, description)));
        }

        body.result
            .ok_or_else(|| AppError::TelegramApi(format!("{}: empty result", method)))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: u32) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: ["message", "callback_query"],
        };
        self.call("getUpdates", &request).await
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
            reply_markup: markup,
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &Path,
        caption: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let bytes = tokio::fs::read(photo).await?;
        let file_name = photo
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "cover.jpg".to_string());

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", PARSE_MODE)
            .part("photo", Part::bytes(bytes).file_name(file_name));

        if let Some(markup) = markup {
            form = form.text("reply_markup", serde_json::to_string(markup)?);
        }

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        let _: serde_json::Value = Self::read_response("sendPhoto", response).await?;
        Ok(())
    }

    async fn edit_reply_markup(
        &self,
        chat_id: ChatId,
        message_id: i64,
        markup: &InlineKeyboardMarkup,
    ) -> Result<()> {
        let request = EditReplyMarkupRequest {
            chat_id,
            message_id,
            reply_markup: markup,
        };
        let _: serde_json::Value = self.call("editMessageReplyMarkup", &request).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        let request = AnswerCallbackRequest {
            callback_query_id: callback_id,
            text,
        };
        let _: bool = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }
}
