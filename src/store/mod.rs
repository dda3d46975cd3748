//! Per-user access codes and Dropbox token pairs.

mod memory;
mod sqlite;

pub use memory::MemoryTokenStore;
pub use sqlite::SqliteTokenStore;

use crate::config::UserConfig;
use crate::error::AppResult;

pub trait TokenStore: Send + Sync {
    fn user_exists(&self, username: &str) -> AppResult<bool>;

    fn verify_access_code(&self, username: &str, access_code: &str) -> AppResult<bool>;

    fn access_token(&self, username: &str) -> AppResult<Option<String>>;

    fn refresh_token(&self, username: &str) -> AppResult<Option<String>>;

    fn save_access_token(&self, username: &str, token: &str) -> AppResult<()>;

    /// Registers configured users. Access codes and refresh tokens follow the config;
    /// a stored access token is only filled in when none is present yet.
    fn seed_users(&self, users: &[UserConfig]) -> AppResult<()>;
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
