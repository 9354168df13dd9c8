mod json;
mod ratings;
mod subscribers;
mod users;

pub use json::{load_or_default, save_atomic};
pub use ratings::RatingsStore;
pub use subscribers::SubscriberRegistry;
pub use users::UserDirectory;
