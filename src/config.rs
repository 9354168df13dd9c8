use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot_token: Option<String>,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_send_time")]
    pub send_time: String,

    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u32,
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_send_time() -> String {
    "08:00".to_string()
}

fn default_base_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("album-bot");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_poll_timeout() -> u32 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            timezone: default_timezone(),
            send_time: default_send_time(),
            base_dir: default_base_dir(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("album-bot")
            .join("config.toml")
    }

    /// Environment wins over the file; the token is usually only set there.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.bot_token = Some(token);
        }
        if let Some(tz) = lookup("ALBUM_BOT_TIMEZONE").filter(|t| !t.is_empty()) {
            self.timezone = tz;
        }
        if let Some(dir) = lookup("ALBUM_BOT_BASE_DIR").filter(|d| !d.is_empty()) {
            self.base_dir = PathBuf::from(dir);
        }
    }

    pub fn require_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Config(format!(
                    "BOT_TOKEN not set (environment or {:?})",
                    Self::config_path()
                ))
            })
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| AppError::Config(format!("unknown time zone: {}", self.timezone)))
    }

    pub fn send_at(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.send_time, "%H:%M")
            .map_err(|e| AppError::Config(format!("invalid send_time {:?}: {}", self.send_time, e)))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn albums_path(&self) -> PathBuf {
        self.data_dir().join("albums.final.json")
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir().join("users.json")
    }

    pub fn subscribers_path(&self) -> PathBuf {
        self.data_dir().join("subscribers.json")
    }

    pub fn sent_path(&self) -> PathBuf {
        self.data_dir().join("sent_albums.json")
    }

    pub fn ratings_path(&self) -> PathBuf {
        self.data_dir().join("ratings.json")
    }

    pub fn default_cover_path(&self) -> PathBuf {
        self.base_dir.join("covers").join("default.jpg")
    }
}
