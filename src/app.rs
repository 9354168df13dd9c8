use std::sync::Arc;

use chrono::Utc;

use crate::bot::{parse_callback, parse_command, BotCommand, CallbackAction};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::delivery::{escape_html, rating_keyboard, send_album};
use crate::error::Result;
use crate::models::{Album, ChatId, ProfileUpdate};
use crate::services::{CallbackQuery, ChatApi, Message, Update};
use crate::store::{RatingsStore, SubscriberRegistry, UserDirectory};

const WELCOME_TEXT: &str = "✅ You're subscribed to daily album recommendations!\n\n\
Commands:\n\
/random — get 2 random albums\n\
/list — albums sent so far (with your ratings)\n\
/unsubscribe — stop the daily send\n\
/subscribe — turn it back on";
const SUBSCRIBED_TEXT: &str = "✅ Subscription enabled.";
const UNSUBSCRIBED_TEXT: &str = "🛑 Subscription disabled. To turn it back on: /subscribe";
const TOO_FEW_ALBUMS_TEXT: &str = "The catalog has too few albums.";
const NOTHING_SENT_TEXT: &str = "Nothing has been sent yet.";
const EXHAUSTED_TEXT: &str = "📭 We've run out of albums!";

/// What one run of the daily job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailyOutcome {
    NoSubscribers,
    Exhausted { notified: usize },
    Delivered { recipients: usize, failures: usize },
}

/// Everything the trigger and the command loop share, built once at start-up.
pub struct App {
    chat: Arc<dyn ChatApi>,
    pub catalog: Catalog,
    pub subscribers: SubscriberRegistry,
    pub ratings: RatingsStore,
    pub users: UserDirectory,
}

impl App {
    pub fn new(config: &Config, chat: Arc<dyn ChatApi>) -> Self {
        let catalog = Catalog::new(
            config.albums_path(),
            config.sent_path(),
            config.base_dir.clone(),
            config.default_cover_path(),
        );

        Self {
            chat,
            catalog,
            subscribers: SubscriberRegistry::new(config.subscribers_path()),
            ratings: RatingsStore::new(config.ratings_path()),
            users: UserDirectory::new(config.users_path()),
        }
    }

    /// The daily job: one fresh pair for every active subscriber, or an
    /// "exhausted" notice when the catalog has run dry.
    pub async fn send_daily_albums(&self) -> Result<DailyOutcome> {
        let subscribers = self.subscribers.load_active_set();
        if subscribers.is_empty() {
            tracing::info!("Daily send skipped: no active subscribers");
            return Ok(DailyOutcome::NoSubscribers);
        }

        let Some((first, second)) = self.catalog.pick_unsent_pair()? else {
            tracing::warn!("Catalog exhausted, notifying {} subscribers", subscribers.len());
            let mut notified = 0;
            for &user in &subscribers {
                match self.chat.send_message(user, EXHAUSTED_TEXT, None).await {
                    Ok(()) => notified += 1,
                    Err(e) => tracing::warn!("Failed to notify {}: {}", user, e),
                }
            }
            return Ok(DailyOutcome::Exhausted { notified });
        };

        tracing::info!(
            "Daily send: {} and {} to {} subscribers",
            first.identifier(),
            second.identifier(),
            subscribers.len()
        );

        let mut failures = 0;
        for &user in &subscribers {
            for album in [&first, &second] {
                if let Err(e) = self.send_album_to(user, album).await {
                    tracing::error!("Failed to deliver {} to {}: {}", album.identifier(), user, e);
                    failures += 1;
                }
            }
        }

        Ok(DailyOutcome::Delivered {
            recipients: subscribers.len(),
            failures,
        })
    }

    async fn send_album_to(&self, user: ChatId, album: &Album) -> Result<()> {
        let cover = self.catalog.resolve_cover(album);
        send_album(self.chat.as_ref(), user, album, &cover).await
    }

    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        if let Some(message) = &update.message {
            self.handle_message(message).await?;
        }
        if let Some(query) = &update.callback_query {
            self.handle_callback(query).await?;
        }
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        let Some(command) = message.text.as_deref().and_then(parse_command) else {
            return Ok(());
        };

        self.users.upsert(&profile_from_message(message))?;
        self.handle_command(command, message.chat.id).await
    }

    pub async fn handle_command(&self, command: BotCommand, chat_id: ChatId) -> Result<()> {
        match command {
            BotCommand::Start => {
                self.subscribers.subscribe(chat_id)?;
                self.chat.send_message(chat_id, WELCOME_TEXT, None).await?;
            }

            BotCommand::Subscribe => {
                self.subscribers.subscribe(chat_id)?;
                self.chat.send_message(chat_id, SUBSCRIBED_TEXT, None).await?;
            }

            BotCommand::Unsubscribe => {
                self.subscribers.unsubscribe(chat_id)?;
                self.chat.send_message(chat_id, UNSUBSCRIBED_TEXT, None).await?;
            }

            BotCommand::Random => match self.catalog.pick_random_pair() {
                Some((first, second)) => {
                    self.send_album_to(chat_id, &first).await?;
                    self.send_album_to(chat_id, &second).await?;
                }
                None => {
                    self.chat.send_message(chat_id, TOO_FEW_ALBUMS_TEXT, None).await?;
                }
            },

            BotCommand::List => {
                let ratings = self.ratings.ratings_for(chat_id);
                let lines: Vec<String> = self
                    .catalog
                    .sent_listing(&ratings)
                    .into_iter()
                    .map(|entry| {
                        let icon = entry.rating.map(|r| r.icon()).unwrap_or("•");
                        format!("{} {}", icon, escape_html(&entry.label))
                    })
                    .collect();

                let text = if lines.is_empty() {
                    NOTHING_SENT_TEXT.to_string()
                } else {
                    lines.join("\n")
                };
                self.chat.send_message(chat_id, &text, None).await?;
            }
        }

        Ok(())
    }

    async fn handle_callback(&self, query: &CallbackQuery) -> Result<()> {
        let Some(action) = query.data.as_deref().map(parse_callback).transpose()?.flatten() else {
            return Ok(());
        };

        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);

        self.users.upsert(&ProfileUpdate {
            chat_id,
            username: query.from.username.clone(),
            first_name: query.from.first_name.clone(),
            last_name: query.from.last_name.clone(),
            seen_at: Utc::now().timestamp(),
        })?;

        match action {
            CallbackAction::Rate { album_id } => {
                // Without the original message there is no keyboard to swap
                if let Some(message) = &query.message {
                    self.chat
                        .edit_reply_markup(chat_id, message.message_id, &rating_keyboard(&album_id))
                        .await?;
                }
                // Empty answer stops the client's loading spinner
                self.chat.answer_callback(&query.id, "").await?;
            }

            CallbackAction::SetRate { album_id, rating } => {
                self.ratings.set_rating(chat_id, &album_id, rating)?;
                self.chat
                    .answer_callback(&query.id, &format!("Rating: {}", rating.label()))
                    .await?;
            }
        }

        Ok(())
    }
}

fn profile_from_message(message: &Message) -> ProfileUpdate {
    let from = message.from.as_ref();
    ProfileUpdate {
        chat_id: message.chat.id,
        username: from.and_then(|u| u.username.clone()),
        first_name: from.and_then(|u| u.first_name.clone()),
        last_name: from.and_then(|u| u.last_name.clone()),
        seen_at: message.date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;
    use crate::services::fake::{FakeChat, Sent};
    use serde_json::{json, Value};
    use std::fs;
    use std::path::PathBuf;

    struct Harness {
        _dir: tempfile::TempDir,
        config: Config,
        chat: Arc<FakeChat>,
        app: App,
    }

    fn harness(albums: Value, subscribers: Option<&str>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            bot_token: Some("test".to_string()),
            timezone: "Europe/Berlin".to_string(),
            send_time: "08:00".to_string(),
            base_dir: dir.path().to_path_buf(),
            poll_timeout_secs: 30,
        };
        fs::create_dir_all(config.data_dir()).unwrap();
        fs::write(config.albums_path(), albums.to_string()).unwrap();
        if let Some(subscribers) = subscribers {
            fs::write(config.subscribers_path(), subscribers).unwrap();
        }

        let chat = Arc::new(FakeChat::default());
        let app = App::new(&config, chat.clone());
        Harness {
            _dir: dir,
            config,
            chat,
            app,
        }
    }

    fn four_albums() -> Value {
        json!([
            {"id": "A", "artist": "Can", "album": "Tago Mago", "year": 1971},
            {"id": "B", "artist": "Neu!", "album": "Neu!"},
            {"id": "C", "artist": "Faust", "album": "IV"},
            {"id": "D", "artist": "Cluster", "album": "Zuckerzeit"}
        ])
    }

    fn update(raw: Value) -> Update {
        serde_json::from_value(raw).unwrap()
    }

    fn command_update(chat_id: i64, text: &str) -> Update {
        update(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "date": 1_700_000_000,
                "chat": {"id": chat_id},
                "from": {"id": chat_id, "first_name": "Ada", "username": "ada"},
                "text": text
            }
        }))
    }

    fn callback_update(chat_id: i64, data: &str) -> Update {
        update(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": chat_id, "first_name": "Ada"},
                "message": {"message_id": 42, "date": 1_700_000_100, "chat": {"id": chat_id}},
                "data": data
            }
        }))
    }

    fn read(path: PathBuf) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_daily_send_without_subscribers_is_a_no_op() {
        let h = harness(four_albums(), None);
        let outcome = h.app.send_daily_albums().await.unwrap();
        assert_eq!(outcome, DailyOutcome::NoSubscribers);
        assert!(h.chat.sent().is_empty());
        assert!(!h.config.sent_path().exists());
    }

    #[tokio::test]
    async fn test_daily_send_delivers_same_pair_to_everyone() {
        let h = harness(four_albums(), Some("[111, 222]"));

        let outcome = h.app.send_daily_albums().await.unwrap();
        assert_eq!(
            outcome,
            DailyOutcome::Delivered {
                recipients: 2,
                failures: 0
            }
        );

        // No covers on disk, so every album arrives as text
        let sent = h.chat.sent();
        assert_eq!(sent.len(), 4);
        let captions: Vec<(i64, String)> = sent
            .iter()
            .map(|s| match s {
                Sent::Message { chat_id, text, .. } => (*chat_id, text.clone()),
                other => panic!("unexpected send: {:?}", other),
            })
            .collect();
        assert_eq!(captions[0].0, 111);
        assert_eq!(captions[2].0, 222);
        assert_eq!(captions[0].1, captions[2].1);
        assert_eq!(captions[1].1, captions[3].1);
        assert_ne!(captions[0].1, captions[1].1);

        assert_eq!(h.app.catalog.load_sent().len(), 2);
    }

    #[tokio::test]
    async fn test_daily_send_skips_inactive_map_subscribers() {
        let h = harness(
            four_albums(),
            Some(r#"{"111": {"active": true}, "222": {"active": false}}"#),
        );
        h.app.send_daily_albums().await.unwrap();
        assert!(h.chat.sent().iter().all(|s| matches!(s, Sent::Message { chat_id: 111, .. })));
    }

    #[tokio::test]
    async fn test_daily_send_uses_cover_when_present() {
        let h = harness(
            json!([
                {"id": "A", "artist": "Can", "album": "Tago Mago", "cover": "covers/a.jpg"},
                {"id": "B", "artist": "Neu!", "album": "Neu!", "cover": "covers/missing.jpg"}
            ]),
            Some("[111]"),
        );
        let covers = h.config.base_dir.join("covers");
        fs::create_dir_all(&covers).unwrap();
        fs::write(covers.join("a.jpg"), b"jpeg").unwrap();
        fs::write(covers.join("default.jpg"), b"jpeg").unwrap();

        h.app.send_daily_albums().await.unwrap();

        let mut photos: Vec<PathBuf> = h
            .chat
            .sent()
            .into_iter()
            .map(|s| match s {
                Sent::Photo { photo, .. } => photo,
                other => panic!("unexpected send: {:?}", other),
            })
            .collect();
        photos.sort();
        assert_eq!(photos, vec![covers.join("a.jpg"), covers.join("default.jpg")]);
    }

    #[tokio::test]
    async fn test_exhausted_catalog_notifies_everyone() {
        let h = harness(four_albums(), Some("[111, 222]"));
        fs::write(h.config.sent_path(), r#"["A", "B", "C"]"#).unwrap();

        let outcome = h.app.send_daily_albums().await.unwrap();
        assert_eq!(outcome, DailyOutcome::Exhausted { notified: 2 });
        assert_eq!(
            h.chat.sent(),
            vec![
                Sent::Message {
                    chat_id: 111,
                    text: EXHAUSTED_TEXT.to_string(),
                    markup: None
                },
                Sent::Message {
                    chat_id: 222,
                    text: EXHAUSTED_TEXT.to_string(),
                    markup: None
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_one_failing_subscriber_does_not_stop_the_rest() {
        let h = harness(four_albums(), Some("[111, 222]"));
        h.chat.fail_messages_to(111);

        let outcome = h.app.send_daily_albums().await.unwrap();
        assert_eq!(
            outcome,
            DailyOutcome::Delivered {
                recipients: 2,
                failures: 2
            }
        );
        assert_eq!(h.chat.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_start_subscribes_and_records_profile() {
        let h = harness(four_albums(), None);
        h.app.handle_update(&command_update(555, "/start")).await.unwrap();

        assert!(h.app.subscribers.load_active_set().contains(&555));
        assert_eq!(read(h.config.users_path())["555"]["username"], json!("ada"));
        assert_eq!(read(h.config.users_path())["555"]["last_seen"], json!(1_700_000_000));
        assert!(matches!(
            h.chat.sent().as_slice(),
            [Sent::Message { chat_id: 555, text, .. }] if text == WELCOME_TEXT
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe_then_subscribe() {
        let h = harness(four_albums(), Some(r#"{"555": {"active": true}}"#));

        h.app.handle_update(&command_update(555, "/unsubscribe")).await.unwrap();
        assert!(h.app.subscribers.load_active_set().is_empty());
        assert_eq!(read(h.config.subscribers_path())["555"]["active"], json!(false));

        h.app.handle_update(&command_update(555, "/subscribe")).await.unwrap();
        assert!(h.app.subscribers.load_active_set().contains(&555));
    }

    #[tokio::test]
    async fn test_random_sends_two_without_marking_sent() {
        let h = harness(four_albums(), None);
        h.app.handle_update(&command_update(7, "/random")).await.unwrap();
        assert_eq!(h.chat.sent().len(), 2);
        assert!(h.app.catalog.load_sent().is_empty());
    }

    #[tokio::test]
    async fn test_random_with_tiny_catalog() {
        let h = harness(json!([{"id": "A"}]), None);
        h.app.handle_command(BotCommand::Random, 7).await.unwrap();
        assert!(matches!(
            h.chat.sent().as_slice(),
            [Sent::Message { text, .. }] if text == TOO_FEW_ALBUMS_TEXT
        ));
    }

    #[tokio::test]
    async fn test_list_shows_ratings_and_raw_identifiers() {
        let h = harness(four_albums(), None);
        fs::write(h.config.sent_path(), r#"["A", "B", "zz-unknown"]"#).unwrap();
        h.app.ratings.set_rating(9, "A", Rating::Positive).unwrap();

        h.app.handle_command(BotCommand::List, 9).await.unwrap();

        match h.chat.sent().as_slice() {
            [Sent::Message { text, .. }] => {
                assert_eq!(text, "⭐ Can — Tago Mago\n• Neu! — Neu!\n• zz-unknown");
            }
            other => panic!("unexpected sends: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_when_nothing_sent() {
        let h = harness(four_albums(), None);
        h.app.handle_command(BotCommand::List, 9).await.unwrap();
        assert!(matches!(
            h.chat.sent().as_slice(),
            [Sent::Message { text, .. }] if text == NOTHING_SENT_TEXT
        ));
    }

    #[tokio::test]
    async fn test_two_step_rating_flow() {
        let h = harness(four_albums(), None);

        h.app.handle_update(&callback_update(9, "rate|A")).await.unwrap();
        assert_eq!(
            h.chat.sent(),
            vec![
                Sent::EditMarkup {
                    chat_id: 9,
                    message_id: 42,
                    markup: rating_keyboard("A"),
                },
                Sent::Answer {
                    callback_id: "cb-1".to_string(),
                    text: String::new(),
                },
            ]
        );
        assert!(h.app.ratings.ratings_for(9).is_empty());

        h.app.handle_update(&callback_update(9, "setrate|A|super")).await.unwrap();
        h.app.handle_update(&callback_update(9, "setrate|A|ok")).await.unwrap();

        assert_eq!(h.app.ratings.ratings_for(9).get("A"), Some(&Rating::Neutral));
        assert_eq!(
            h.chat.sent().last(),
            Some(&Sent::Answer {
                callback_id: "cb-1".to_string(),
                text: format!("Rating: {}", Rating::Neutral.label()),
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_rating_fails_only_that_update() {
        let h = harness(four_albums(), None);
        let result = h.app.handle_update(&callback_update(9, "setrate|A|meh")).await;
        assert!(result.is_err());
        assert!(!h.config.ratings_path().exists());

        h.app.handle_update(&callback_update(9, "setrate|A|bad")).await.unwrap();
        assert_eq!(h.app.ratings.ratings_for(9).get("A"), Some(&Rating::Negative));
    }

    #[tokio::test]
    async fn test_plain_text_is_ignored() {
        let h = harness(four_albums(), None);
        h.app.handle_update(&command_update(9, "hello there")).await.unwrap();
        assert!(h.chat.sent().is_empty());
        assert!(!h.config.users_path().exists());
    }
}
