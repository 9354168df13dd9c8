use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A user's verdict on an album. The serialized names are what
/// `ratings.json` and `setrate|…` payloads carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "bad")]
    Negative,
    #[serde(rename = "ok")]
    Neutral,
    #[serde(rename = "super")]
    Positive,
}

impl Rating {
    pub const ALL: [Rating; 3] = [Rating::Negative, Rating::Neutral, Rating::Positive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Negative => "bad",
            Rating::Neutral => "ok",
            Rating::Positive => "super",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Rating::Negative => "❌",
            Rating::Neutral => "😐",
            Rating::Positive => "⭐",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Negative => "❌ Didn't like it",
            Rating::Neutral => "😐 It's okay",
            Rating::Positive => "⭐ Loved it",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rating::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AppError::InvalidCallback(format!("unknown rating value {:?}", s)))
    }
}
