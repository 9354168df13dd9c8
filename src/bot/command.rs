use crate::delivery::{RATE_PREFIX, SET_RATE_PREFIX};
use crate::error::{AppError, Result};
use crate::models::Rating;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Subscribe,
    Unsubscribe,
    Random,
    List,
}

/// What a button press asks for; all state lives in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// First tap: show the rating choices for this album.
    Rate { album_id: String },
    /// Second tap: store the choice.
    SetRate { album_id: String, rating: Rating },
}

/// `/list`, `/list@my_bot` and `/list extra words` are all `List`.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);

    match name {
        "start" => Some(BotCommand::Start),
        "subscribe" => Some(BotCommand::Subscribe),
        "unsubscribe" => Some(BotCommand::Unsubscribe),
        "random" => Some(BotCommand::Random),
        "list" => Some(BotCommand::List),
        _ => None,
    }
}

/// Unknown prefixes are ignored (`Ok(None)`); a known prefix with a bad body
/// is an error for this update only.
pub fn parse_callback(data: &str) -> Result<Option<CallbackAction>> {
    let Some((prefix, rest)) = data.split_once('|') else {
        return Ok(None);
    };

    match prefix {
        RATE_PREFIX => Ok(Some(CallbackAction::Rate {
            album_id: rest.to_string(),
        })),
        SET_RATE_PREFIX => {
            let (album_id, value) = rest
                .rsplit_once('|')
                .ok_or_else(|| AppError::InvalidCallback(data.to_string()))?;
            Ok(Some(CallbackAction::SetRate {
                album_id: album_id.to_string(),
                rating: value.parse()?,
            }))
        }
        _ => Ok(None),
    }
}
