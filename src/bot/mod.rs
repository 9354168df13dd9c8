mod command;

pub use command::{parse_callback, parse_command, BotCommand, CallbackAction};
